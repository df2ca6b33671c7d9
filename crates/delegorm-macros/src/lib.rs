//! Procedural macros for delegorm.
//!
//! `delegorm-macros` is the **compile-time codegen layer**. `#[derive(Model)]`
//! turns a struct into a table mapping: static per-field metadata (including
//! the delegation flags the write path reads) and row conversions.
//!
//! Application crates use it through the `delegorm` facade.

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod parse;
mod validate;

use parse::{ModelDef, parse_model};

/// Derive macro for the `Model` trait.
///
/// Generates table and primary key metadata, the static `FieldInfo`
/// table, row conversions (`to_row`, `from_row`, `apply_row`) and
/// primary key access.
///
/// # Attributes
///
/// - `#[delegorm(table = "name")]` - Override table name (defaults to snake_case struct name)
/// - `#[delegorm(primary_key)]` - Mark field as primary key (without one, a field
///   named `id` is the key; an `Option` id is assigned by the database)
/// - `#[delegorm(auto_increment)]` - The database assigns the key on INSERT
/// - `#[delegorm(column = "name")]` - Override column name
/// - `#[delegorm(nullable)]` - Mark field as nullable
/// - `#[delegorm(default = "expr")]` - Record the column's SQL DEFAULT
/// - `#[delegorm(skip)]` - Not a column
/// - `#[delegorm(delegated)]` - Never sent; the database decides it on INSERT and UPDATE
/// - `#[delegorm(return_on_insert)]` - Never sent on INSERT, read back from the database
/// - `#[delegorm(return_on_update)]` - Never sent on UPDATE, read back from the database
///
/// # Example
///
/// ```ignore
/// use delegorm::Model;
///
/// #[derive(Model)]
/// #[delegorm(table = "partially_delegated")]
/// struct PartiallyDelegated {
///     #[delegorm(primary_key, auto_increment)]
///     id: Option<i64>,
///     #[delegorm(return_on_insert)]
///     insert: Option<i64>,
///     #[delegorm(return_on_update)]
///     update: Option<i64>,
///     #[delegorm(delegated)]
///     both: Option<i64>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(delegorm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_model(&model) {
        return e.to_compile_error().into();
    }

    generate_model_impl(&model).into()
}

/// Generate the Model trait implementation from a parsed model definition.
fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let table_name = &model.table_name;
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();

    let pk_columns: Vec<&str> = model
        .primary_key_fields()
        .iter()
        .map(|f| f.column_name.as_str())
        .collect();

    let field_infos = generate_field_infos(model);
    let to_row_body = generate_to_row(model);
    let from_row_body = generate_from_row(model);
    let apply_row_body = generate_apply_row(model);
    let pk_value_body = generate_primary_key_value(model);
    let is_new_body = generate_is_new(model);

    quote::quote! {
        impl #impl_generics delegorm_core::Model for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const PRIMARY_KEY: &'static [&'static str] = &[#(#pk_columns),*];

            fn fields() -> &'static [delegorm_core::FieldInfo] {
                static FIELDS: &[delegorm_core::FieldInfo] = &[
                    #field_infos
                ];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, delegorm_core::Value)> {
                #to_row_body
            }

            fn from_row(row: &delegorm_core::Row) -> delegorm_core::Result<Self> {
                #from_row_body
            }

            fn apply_row(&mut self, row: &delegorm_core::Row) -> delegorm_core::Result<()> {
                #apply_row_body
            }

            fn primary_key_value(&self) -> Vec<delegorm_core::Value> {
                #pk_value_body
            }

            fn is_new(&self) -> bool {
                #is_new_body
            }
        }
    }
}

fn generate_field_infos(model: &ModelDef) -> proc_macro2::TokenStream {
    let mut field_ts = Vec::new();

    for field in model.column_fields() {
        let field_ident = field.name.unraw();
        let column_name = &field.column_name;
        let nullable = field.nullable;
        let primary_key = field.primary_key;
        let auto_increment = field.auto_increment;
        let delegated = field.delegated;
        let return_on_insert = field.return_on_insert;
        let return_on_update = field.return_on_update;
        let default_ts = match &field.default {
            Some(d) => quote::quote! { Some(#d) },
            None => quote::quote! { None },
        };

        field_ts.push(quote::quote! {
            delegorm_core::FieldInfo::new(stringify!(#field_ident), #column_name)
                .nullable(#nullable)
                .primary_key(#primary_key)
                .auto_increment(#auto_increment)
                .default_opt(#default_ts)
                .delegated(#delegated)
                .return_on_insert(#return_on_insert)
                .return_on_update(#return_on_update)
        });
    }

    quote::quote! { #(#field_ts),* }
}

fn generate_to_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let conversions = model.column_fields().into_iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        if parse::is_option_type(&field.ty) {
            quote::quote! {
                (#column_name, match &self.#field_name {
                    Some(v) => delegorm_core::Value::from(v.clone()),
                    None => delegorm_core::Value::Null,
                })
            }
        } else {
            quote::quote! {
                (#column_name, delegorm_core::Value::from(self.#field_name.clone()))
            }
        }
    });

    quote::quote! {
        vec![#(#conversions),*]
    }
}

fn generate_from_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;

    let fields = model.fields.iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        if field.skip {
            quote::quote! { #field_name: Default::default() }
        } else {
            quote::quote! { #field_name: row.get_named(#column_name)? }
        }
    });

    quote::quote! {
        Ok(#name {
            #(#fields,)*
        })
    }
}

/// Assign each field whose column the row carries; leave the rest.
fn generate_apply_row(model: &ModelDef) -> proc_macro2::TokenStream {
    let assignments = model.column_fields().into_iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        let ty = &field.ty;
        quote::quote! {
            if let Some(value) = row.try_get_named::<#ty>(#column_name)? {
                self.#field_name = value;
            }
        }
    });

    quote::quote! {
        #(#assignments)*
        Ok(())
    }
}

fn generate_primary_key_value(model: &ModelDef) -> proc_macro2::TokenStream {
    let value_exprs = model.primary_key_fields().into_iter().map(|field| {
        let field_name = &field.name;
        if parse::is_option_type(&field.ty) {
            quote::quote! {
                match &self.#field_name {
                    Some(v) => delegorm_core::Value::from(v.clone()),
                    None => delegorm_core::Value::Null,
                }
            }
        } else {
            quote::quote! {
                delegorm_core::Value::from(self.#field_name.clone())
            }
        }
    });

    quote::quote! {
        vec![#(#value_exprs),*]
    }
}

/// A model is new while an optional primary key is unset.
fn generate_is_new(model: &ModelDef) -> proc_macro2::TokenStream {
    let optional_keys: Vec<_> = model
        .primary_key_fields()
        .into_iter()
        .filter(|f| parse::is_option_type(&f.ty))
        .map(|f| &f.name)
        .collect();

    if optional_keys.is_empty() {
        return quote::quote! { true };
    }

    quote::quote! {
        #(self.#optional_keys.is_none())||*
    }
}
