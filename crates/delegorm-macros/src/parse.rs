//! Parsing logic for the Model derive macro.
//!
//! Extracts struct-level and field-level `#[delegorm(...)]` attributes
//! into [`ModelDef`] and [`FieldDef`] for code generation.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    pub name: Ident,
    /// The SQL table name.
    pub table_name: String,
    /// Span of the `table = "..."` literal, or the struct name.
    pub table_span: Span,
    pub fields: Vec<FieldDef>,
    pub generics: Generics,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    pub column_name: String,
    pub ty: Type,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// SQL DEFAULT expression, informational only
    pub default: Option<String>,
    /// Not a column at all
    pub skip: bool,
    /// The database always decides this column
    pub delegated: bool,
    /// The database decides this column on INSERT
    pub return_on_insert: bool,
    /// The database decides this column on UPDATE
    pub return_on_update: bool,
}

impl ModelDef {
    /// Fields that map to columns, in declaration order.
    pub fn column_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| !f.skip).collect()
    }

    pub fn primary_key_fields(&self) -> Vec<&FieldDef> {
        self.fields
            .iter()
            .filter(|f| f.primary_key && !f.skip)
            .collect()
    }
}

impl FieldDef {
    pub fn has_delegation(&self) -> bool {
        self.delegated || self.return_on_insert || self.return_on_update
    }
}

/// Parse a `#[derive(Model)]` input.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let (table_name, table_span) = match parse_struct_attrs(&input.attrs)? {
        Some((table, span)) => (table, span),
        None => (to_snake_case(&name.to_string()), name.span()),
    };

    let mut fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    promote_implicit_id(&mut fields);

    Ok(ModelDef {
        name,
        table_name,
        table_span,
        fields,
        generics,
    })
}

/// Without an explicit `primary_key`, a field named `id` is the key. An
/// `Option` id is assigned by the database on INSERT.
fn promote_implicit_id(fields: &mut [FieldDef]) {
    if fields.iter().any(|f| f.primary_key && !f.skip) {
        return;
    }
    if let Some(id) = fields.iter_mut().find(|f| f.name == "id" && !f.skip) {
        id.primary_key = true;
        id.auto_increment = id.auto_increment || is_option_type(&id.ty);
    }
}

/// Parse struct-level `#[delegorm(table = "...")]`.
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<Option<(String, Span)>> {
    let mut table: Option<(String, Span)> = None;

    for attr in attrs {
        if !attr.path().is_ident("delegorm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for table name",
                    ));
                };
                if table.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate delegorm attribute: table",
                    ));
                }
                table = Some((lit_str.value(), lit_str.span()));
                Ok(())
            } else {
                Err(meta.error(format!(
                    "unknown delegorm struct attribute `{}`",
                    meta.path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                )))
            }
        })?;
    }

    Ok(table)
}

/// Convert PascalCase to snake_case.
///
/// `WithDelegatedFields` becomes `with_delegated_fields`, `HTTPLog`
/// becomes `http_log`.
pub(crate) fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                let should_underscore = prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(|n| n.is_lowercase()));
                if should_underscore {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let ty = field.ty.clone();
    let inferred_nullable = is_option_type(&ty);

    let attrs = parse_field_attrs(&field.attrs)?;
    let column_name = attrs.column.unwrap_or_else(|| name.to_string());

    Ok(FieldDef {
        name,
        column_name,
        ty,
        nullable: attrs.nullable.unwrap_or(inferred_nullable),
        primary_key: attrs.primary_key,
        auto_increment: attrs.auto_increment,
        default: attrs.default,
        skip: attrs.skip,
        delegated: attrs.delegated,
        return_on_insert: attrs.return_on_insert,
        return_on_update: attrs.return_on_update,
    })
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    nullable: Option<bool>,
    primary_key: bool,
    auto_increment: bool,
    default: Option<String>,
    skip: bool,
    delegated: bool,
    return_on_insert: bool,
    return_on_update: bool,
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    match value {
        Lit::Str(lit_str) => Ok(lit_str.value()),
        other => Err(Error::new_spanned(
            other,
            format!("expected string literal for {what}"),
        )),
    }
}

/// Parse all `#[delegorm(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("delegorm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("auto_increment") {
                result.auto_increment = true;
            } else if path.is_ident("nullable") {
                result.nullable = Some(true);
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("delegated") {
                result.delegated = true;
            } else if path.is_ident("return_on_insert") {
                result.return_on_insert = true;
            } else if path.is_ident("return_on_update") {
                result.return_on_update = true;
            } else if path.is_ident("column") {
                result.column = Some(string_value(&meta, "column name")?);
            } else if path.is_ident("default") {
                result.default = Some(string_value(&meta, "default expression")?);
            } else {
                return Err(meta.error(format!(
                    "unknown delegorm field attribute `{}`",
                    path.get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                )));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Check if a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
