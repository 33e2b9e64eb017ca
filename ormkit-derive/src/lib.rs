//! `#[derive(Mapped)]`: builds an `ormkit::mapping::TableMapping` from a
//! record type's attributes at compile time (spec.md §9 "reflection-driven
//! mapping in the source becomes compile-time derived metadata"), covering
//! the full annotation set in spec.md §6.
//!
//! Attribute shape mirrors `pgorm-derive`'s single `#[orm(...)]` helper
//! attribute, here named `#[ormkit(...)]`.

use darling::ast::Data;
use darling::util::Ignored;
use darling::{FromDeriveInput, FromField, FromMeta};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, PathArguments, Type};

#[derive(Debug, FromMeta, Default)]
struct ForeignKeyAttr {
    target: String,
    #[darling(default)]
    target_column: Option<String>,
}

#[derive(Debug, FromMeta)]
struct JoinFilterAttr {
    column: String,
    value: String,
}

#[derive(Debug, FromMeta)]
struct AssociativeTableAttr {
    target: String,
    link_table: String,
    source_fk: String,
    target_fk: String,
}

#[derive(Debug, FromField)]
#[darling(attributes(ormkit))]
struct FieldAttrs {
    ident: Option<syn::Ident>,
    ty: Type,

    #[darling(default)]
    column: Option<String>,
    #[darling(default)]
    primary_key: bool,
    #[darling(default)]
    auto_generated: bool,
    #[darling(default)]
    not_null: bool,
    #[darling(default)]
    unique: bool,
    #[darling(default)]
    secret: bool,
    #[darling(default)]
    hashed: bool,
    #[darling(default)]
    ignore_case: bool,
    #[darling(default)]
    always_join: bool,
    #[darling(default)]
    application_encrypt: bool,
    #[darling(default)]
    public_key: bool,
    #[darling(default)]
    public_key_ref: Option<String>,
    #[darling(default)]
    default_value: Option<String>,
    #[darling(default)]
    foreign_key: Option<ForeignKeyAttr>,
    #[darling(default)]
    join_filter: Option<JoinFilterAttr>,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(ormkit), supports(struct_named))]
struct TableAttrs {
    ident: syn::Ident,
    data: Data<Ignored, FieldAttrs>,

    table: String,
    #[darling(default, multiple)]
    associative_table: Vec<AssociativeTableAttr>,
    #[darling(default, multiple)]
    skip_hint: Vec<String>,
}

/// Derives `ormkit::mapping::Mapped` for a record type, consuming the
/// `#[ormkit(...)]` struct- and field-level annotations described in
/// spec.md §6.
#[proc_macro_derive(Mapped, attributes(ormkit))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let attrs = match TableAttrs::from_derive_input(&input) {
        Ok(attrs) => attrs,
        Err(err) => return err.write_errors().into(),
    };

    expand(attrs).into()
}

fn expand(attrs: TableAttrs) -> proc_macro2::TokenStream {
    let ident = &attrs.ident;
    let table = &attrs.table;

    let fields = match attrs.data {
        Data::Struct(fields) => fields.fields,
        Data::Enum(_) => {
            return syn::Error::new_spanned(ident, "Mapped cannot be derived for enums").to_compile_error()
        }
    };

    let mut column_exprs = Vec::new();
    let mut always_join_tables = Vec::new();
    let mut value_read_arms = Vec::new();
    let mut value_write_arms = Vec::new();
    let mut has_primary_key = false;

    for field in &fields {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let logical_name = field_ident.to_string();
        let physical_name = field.column.clone().unwrap_or_else(|| logical_name.clone());

        value_read_arms.push(quote! {
            #physical_name => ::ormkit::value::Value::from(self.#field_ident.clone()),
        });
        value_write_arms.push(quote! {
            #physical_name => {
                self.#field_ident = ::std::convert::TryInto::try_into(value)?;
                Ok(())
            }
        });

        let (inner_ty, nullable) = unwrap_option(&field.ty);
        let schema_type = infer_schema_type(inner_ty);

        let primary_key = field.primary_key;
        has_primary_key = has_primary_key || primary_key;
        let auto_generated = field.auto_generated;
        let not_null = field.not_null || primary_key;
        let unique = field.unique;
        let secret = field.secret;
        let hashed = field.hashed;
        let ignore_case = field.ignore_case;
        let public_key = field.public_key;
        let application_encrypt = field.application_encrypt;

        let public_key_ref = opt_string_tokens(&field.public_key_ref);
        let default_value = match &field.default_value {
            Some(v) => quote! { Some(::ormkit::value::Value::text(#v)) },
            None => quote! { None },
        };

        let foreign_key = match &field.foreign_key {
            Some(fk) => {
                let target = &fk.target;
                let target_column = fk.target_column.clone().unwrap_or_else(|| "id".to_string());
                if field.always_join {
                    always_join_tables.push(target.clone());
                }
                quote! {
                    Some(::ormkit::mapping::ForeignKeyDescriptor {
                        target_table: #target.to_string(),
                        target_column: #target_column.to_string(),
                    })
                }
            }
            None => quote! { None },
        };

        let join_filter = match &field.join_filter {
            Some(jf) => {
                let column = &jf.column;
                let value = &jf.value;
                quote! {
                    Some(::ormkit::mapping::JoinFilter {
                        column: #column.to_string(),
                        value: ::ormkit::value::Value::text(#value),
                    })
                }
            }
            None => quote! { None },
        };

        column_exprs.push(quote! {
            ::ormkit::mapping::ColumnMapping {
                physical_name: #physical_name.to_string(),
                logical_name: #logical_name.to_string(),
                schema_type: #schema_type,
                nullable: #nullable,
                primary_key: #primary_key,
                auto_generated: #auto_generated,
                not_null: #not_null,
                secret: #secret,
                unique: #unique,
                hashed: #hashed,
                application_encrypted: #application_encrypt,
                ignore_case: #ignore_case,
                public_key: #public_key,
                public_key_ref: #public_key_ref,
                foreign_key: #foreign_key,
                join_filter: #join_filter,
                default_value: #default_value,
            }
        });
    }

    if !has_primary_key {
        return syn::Error::new_spanned(
            ident,
            "Mapped requires at least one field annotated #[ormkit(primary_key)]",
        )
        .to_compile_error();
    }

    let associative_tables: Vec<_> = attrs
        .associative_table
        .iter()
        .map(|a| {
            let target = &a.target;
            let link_table = &a.link_table;
            let source_fk = &a.source_fk;
            let target_fk = &a.target_fk;
            quote! {
                ::ormkit::mapping::AssociativeTableRef {
                    target_table: #target.to_string(),
                    link_table: #link_table.to_string(),
                    source_fk_column: #source_fk.to_string(),
                    target_fk_column: #target_fk.to_string(),
                }
            }
        })
        .collect();

    let always_join_tokens: Vec<_> = always_join_tables.iter().map(|t| quote! { #t.to_string() }).collect();
    let skip_hints = &attrs.skip_hint;
    let type_name = ident.to_string();

    quote! {
        impl ::ormkit::mapping::Mapped for #ident {
            fn describe() -> ::ormkit::mapping::TableMapping {
                let columns = vec![ #(#column_exprs),* ];

                let mut mapping = ::ormkit::mapping::TableMapping::new(#type_name, #table, columns)
                    .with_associative_tables(vec![ #(#associative_tables),* ])
                    .with_always_join(vec![ #(#always_join_tokens),* ]);

                mapping.skip_hints = vec![ #(#skip_hints.to_string()),* ];
                mapping
            }
        }

        impl ::ormkit::mapping::Record for #ident {
            fn column_value(&self, physical_name: &str) -> ::ormkit::value::Value {
                match physical_name {
                    #(#value_read_arms)*
                    other => panic!("no such column `{}` on `{}`", other, #type_name),
                }
            }

            fn set_column_value(&mut self, physical_name: &str, value: ::ormkit::value::Value) -> ::ormkit::error::Result<()> {
                match physical_name {
                    #(#value_write_arms)*
                    other => Err(::ormkit::error::ErrorKind::MappingError {
                        reason: format!("no such column `{}` on `{}`", other, #type_name),
                    }
                    .into()),
                }
            }
        }
    }
}

fn opt_string_tokens(value: &Option<String>) -> proc_macro2::TokenStream {
    match value {
        Some(v) => quote! { Some(#v.to_string()) },
        None => quote! { None },
    }
}

/// `Option<T>` fields are nullable columns described by the inner type;
/// everything else is a non-nullable column of its own type.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (inner, true);
                    }
                }
            }
        }
    }
    (ty, false)
}

/// Maps a field's Rust type to the neutral `SchemaType` the dialect layer
/// understands (spec.md §4.3). Falls back to `String` for anything not
/// recognised, matching the permissive stance the rest of the mapping
/// layer takes toward custom scalar types.
fn infer_schema_type(ty: &Type) -> proc_macro2::TokenStream {
    let name = type_name(ty);

    match name.as_deref() {
        Some("i8") | Some("i16") | Some("i32") | Some("u8") | Some("u16") | Some("u32") => {
            quote! { ::ormkit::dialect::SchemaType::Integer }
        }
        Some("i64") | Some("u64") | Some("isize") | Some("usize") => {
            quote! { ::ormkit::dialect::SchemaType::Integer }
        }
        Some("f32") => quote! { ::ormkit::dialect::SchemaType::Float },
        Some("f64") => quote! { ::ormkit::dialect::SchemaType::Decimal },
        Some("bool") => quote! { ::ormkit::dialect::SchemaType::Boolean },
        Some("String") | Some("str") => quote! { ::ormkit::dialect::SchemaType::String },
        Some("Uuid") => quote! { ::ormkit::dialect::SchemaType::Uuid },
        Some("NaiveDate") => quote! { ::ormkit::dialect::SchemaType::Date },
        Some("NaiveTime") => quote! { ::ormkit::dialect::SchemaType::DateTime },
        Some("DateTime") => quote! { ::ormkit::dialect::SchemaType::DateTime },
        Some("BigDecimal") => quote! { ::ormkit::dialect::SchemaType::Decimal },
        Some("Vec") => quote! { ::ormkit::dialect::SchemaType::Binary },
        _ => quote! { ::ormkit::dialect::SchemaType::String },
    }
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}
