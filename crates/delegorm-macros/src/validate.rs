//! Compile-time validation for the Model derive macro.
//!
//! All problems are collected and reported together.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::{Error, GenericArgument, PathArguments, Type};

use crate::parse::{FieldDef, ModelDef};

/// Validate a parsed model definition.
pub fn validate_model(model: &ModelDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    validate_has_fields(model, &mut errors);
    validate_table_name(&model.table_name, model.table_span, &mut errors);
    validate_no_duplicate_columns(model, &mut errors);

    for field in &model.fields {
        validate_type(&field.ty, field.name.span(), &mut errors);
        validate_delegation(field, &mut errors);
        if field.auto_increment && !field.primary_key {
            errors.push(Error::new(
                field.name.span(),
                "auto_increment requires primary_key; add #[delegorm(primary_key)] to this field",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

fn validate_has_fields(model: &ModelDef, errors: &mut Vec<Error>) {
    if model.column_fields().is_empty() {
        errors.push(Error::new(
            model.name.span(),
            "Model struct must have at least one non-skipped field",
        ));
    }
}

/// Table names are interpolated into SQL as quoted identifiers.
fn validate_table_name(table_name: &str, span: Span, errors: &mut Vec<Error>) {
    const DANGEROUS_CHARS: &[char] = &[';', '\'', '"', '`', '-', '/', '*', '\\', '\0', '\n', '\r'];

    if let Some(ch) = table_name.chars().find(|c| DANGEROUS_CHARS.contains(c)) {
        errors.push(Error::new(
            span,
            format!(
                "table name contains invalid character '{ch}'; \
                 table names should only contain alphanumeric characters and underscores"
            ),
        ));
        return;
    }

    match table_name.chars().next() {
        None => errors.push(Error::new(span, "table name cannot be empty")),
        Some(first) if !first.is_alphabetic() && first != '_' => errors.push(Error::new(
            span,
            format!("table name must start with a letter or underscore, got '{first}'"),
        )),
        Some(_) => {}
    }
}

fn validate_no_duplicate_columns(model: &ModelDef, errors: &mut Vec<Error>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for field in model.column_fields() {
        if !seen.insert(&field.column_name) {
            errors.push(Error::new(
                field.name.span(),
                format!(
                    "duplicate column name '{}'; another field already maps to this column",
                    field.column_name
                ),
            ));
        }
    }
}

/// Check the combinations of `delegated`, `return_on_insert` and
/// `return_on_update` with each other and with the host attributes.
fn validate_delegation(field: &FieldDef, errors: &mut Vec<Error>) {
    let span = field.name.span();

    if field.delegated && (field.return_on_insert || field.return_on_update) {
        errors.push(Error::new(
            span,
            "`delegated` already covers INSERT and UPDATE; \
             remove `return_on_insert`/`return_on_update`",
        ));
    }

    if field.skip && field.has_delegation() {
        errors.push(Error::new(
            span,
            "a #[delegorm(skip)] field is not a column and cannot be delegated",
        ));
    }

    if field.skip && field.primary_key {
        errors.push(Error::new(
            span,
            "cannot use both `skip` and `primary_key` on the same field",
        ));
    }

    if field.primary_key && (field.delegated || field.return_on_update) {
        errors.push(Error::new(
            span,
            "a primary key identifies the row on UPDATE and cannot be delegated for UPDATE; \
             use `auto_increment` or `return_on_insert` instead",
        ));
    }
}

fn validate_type(ty: &Type, span: Span, errors: &mut Vec<Error>) {
    if is_nested_option(ty) {
        errors.push(Error::new(
            span,
            "nested Option<Option<T>> is ambiguous and not supported; use a single Option<T>",
        ));
    }

    if matches!(ty, Type::Reference(_)) {
        errors.push(Error::new(
            span,
            "reference types (&T) are not supported; use owned types instead",
        ));
    }
}

fn is_nested_option(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Option" {
        return false;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };
    matches!(
        args.args.first(),
        Some(GenericArgument::Type(Type::Path(inner)))
            if inner.path.segments.last().is_some_and(|s| s.ident == "Option")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_model;
    use syn::{DeriveInput, parse_quote};

    fn check(input: DeriveInput) -> Result<(), Error> {
        validate_model(&parse_model(&input).unwrap())
    }

    #[test]
    fn test_accepts_delegated_models() {
        check(parse_quote! {
            struct PartiallyDelegated {
                #[delegorm(primary_key, auto_increment)]
                id: Option<i64>,
                #[delegorm(return_on_insert)]
                insert: Option<i64>,
                #[delegorm(return_on_update)]
                update: Option<i64>,
                #[delegorm(delegated)]
                both: Option<i64>,
            }
        })
        .unwrap();
    }

    #[test]
    fn test_rejects_redundant_flags() {
        let err = check(parse_quote! {
            struct Item {
                id: Option<i64>,
                #[delegorm(delegated, return_on_insert)]
                a: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("already covers"));
    }

    #[test]
    fn test_rejects_delegated_skip_field() {
        let err = check(parse_quote! {
            struct Item {
                id: Option<i64>,
                #[delegorm(skip, return_on_update)]
                a: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("cannot be delegated"));
    }

    #[test]
    fn test_primary_key_delegation() {
        let err = check(parse_quote! {
            struct Item {
                #[delegorm(primary_key, return_on_update)]
                id: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("primary key"));

        check(parse_quote! {
            struct Item {
                #[delegorm(primary_key, return_on_insert)]
                id: Option<String>,
            }
        })
        .unwrap();
    }

    #[test]
    fn test_implicit_id_key_cannot_be_delegated() {
        let err = check(parse_quote! {
            struct Item {
                #[delegorm(delegated)]
                id: Option<i64>,
                a: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = check(parse_quote! {
            struct Item {
                id: Option<i64>,
                #[delegorm(column = "id")]
                other: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'id'"));
    }

    #[test]
    fn test_validate_table_name() {
        let mut errors = Vec::new();
        validate_table_name("only_delegated", Span::call_site(), &mut errors);
        validate_table_name("_internal", Span::call_site(), &mut errors);
        assert!(errors.is_empty());

        validate_table_name("items; DROP TABLE items", Span::call_site(), &mut errors);
        assert_eq!(errors.len(), 1);
        validate_table_name("1items", Span::call_site(), &mut errors);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_is_nested_option() {
        let ty: Type = parse_quote!(Option<Option<i32>>);
        assert!(is_nested_option(&ty));
        let ty: Type = parse_quote!(Option<i32>);
        assert!(!is_nested_option(&ty));
    }
}
