use crate::CRATE;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::spanned::Spanned;

pub fn derive(input: &syn::DeriveInput) -> syn::Result<TokenStream> {
    let s = match &input.data {
        syn::Data::Struct(s) => s,
        syn::Data::Enum(e) => {
            return Err(syn::Error::new(
                e.enum_token.span(),
                "SyncableRecord cannot be derived for enums",
            ))
        }
        syn::Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "SyncableRecord cannot be derived for unions",
            ))
        }
    };

    let fields = match &s.fields {
        syn::Fields::Named(named) => &named.named,
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "SyncableRecord can only be derived for structs with named fields",
            ))
        }
    };

    let ty = &input.ident;
    let vis = &input.vis;
    let changeset_ty = syn::Ident::new(&format!("{}Changeset", ty), Span::call_site());

    let mut field_decls = Vec::new();
    let mut diff_inits = Vec::new();
    let mut undo_arms = Vec::new();
    let mut merge_inits = Vec::new();
    let mut merge_cloud_stmts = Vec::new();
    let mut is_empty_terms = Vec::new();

    for f in fields {
        let name = f.ident.as_ref().expect("named field");
        let fty = &f.ty;
        let nested = is_nested(f)?;

        if nested {
            field_decls.push(quote! {
                pub #name: <#fty as #CRATE::RecordFields>::Changeset
            });
            diff_inits.push(quote! {
                #name: <#fty as #CRATE::RecordFields>::diff(&baseline.#name, &current.#name)
            });
            undo_arms.push(quote! {
                redo.#name = <#fty as #CRATE::RecordFields>::apply_undo(&mut current.#name, &cs.#name)?;
            });
            let history_field = syn::Ident::new(&format!("__history_{}", name), Span::call_site());
            merge_inits.push(quote! {
                #name: {
                    let #history_field: ::std::vec::Vec<_> = history.iter().map(|h| h.#name.clone()).collect();
                    <#fty as #CRATE::RecordFields>::merge(&#history_field, &current.#name)
                }
            });
            merge_cloud_stmts.push(quote! {
                redo.#name = <#fty as #CRATE::RecordFields>::merge_cloud(&baseline.#name, &mut local.#name, &remote.#name)?;
            });
            is_empty_terms.push(quote! { self.#name.is_empty() });
        } else {
            field_decls.push(quote! {
                pub #name: #CRATE::Tracked<#fty>
            });
            diff_inits.push(quote! {
                #name: if baseline.#name != current.#name {
                    #CRATE::Tracked::Value(baseline.#name.clone())
                } else {
                    #CRATE::Tracked::Untouched
                }
            });
            let field_name_str = name.to_string();
            undo_arms.push(quote! {
                match &cs.#name {
                    #CRATE::Tracked::Untouched => {}
                    #CRATE::Tracked::Value(old) => {
                        redo.#name = #CRATE::Tracked::Value(::std::mem::replace(&mut current.#name, old.clone()));
                    }
                    #CRATE::Tracked::Absent | #CRATE::Tracked::NestedRef => {
                        return Err(#CRATE::SyncError::MalformedChangeset {
                            reason: ::std::format!("field `{}` changeset entry cannot be Absent or NestedRef", #field_name_str),
                        });
                    }
                }
            });
            let history_field = syn::Ident::new(&format!("__history_{}", name), Span::call_site());
            merge_inits.push(quote! {
                #name: {
                    let #history_field = history.iter().map(|h| h.#name.clone());
                    #CRATE::merge_scalar_field(#history_field)
                }
            });
            merge_cloud_stmts.push(quote! {
                {
                    let locally_modified = local.#name != baseline.#name;
                    let remotely_modified = remote.#name != baseline.#name;
                    match (locally_modified, remotely_modified) {
                        (false, true) => {
                            redo.#name = #CRATE::Tracked::Value(local.#name.clone());
                            local.#name = remote.#name.clone();
                        }
                        (true, true) => {
                            #CRATE::trace_cloud_merge_conflict(#field_name_str);
                        }
                        _ => {}
                    }
                }
            });
            is_empty_terms.push(quote! { self.#name.is_untouched() });
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        #[derive(Clone, Debug, Default, PartialEq)]
        #vis struct #changeset_ty #impl_generics #where_clause {
            #(#field_decls),*
        }

        impl #impl_generics #CRATE::RecordChangeset for #changeset_ty #ty_generics #where_clause {
            fn is_empty(&self) -> bool {
                #(#is_empty_terms)&&*
            }
        }

        impl #impl_generics #CRATE::RecordFields for #ty #ty_generics #where_clause {
            type Changeset = #changeset_ty #ty_generics;

            fn diff(baseline: &Self, current: &Self) -> Self::Changeset {
                #changeset_ty {
                    #(#diff_inits),*
                }
            }

            fn apply_undo(current: &mut Self, cs: &Self::Changeset) -> #CRATE::SyncResult<Self::Changeset> {
                let mut redo = <Self::Changeset as ::std::default::Default>::default();
                #(#undo_arms)*
                Ok(redo)
            }

            fn merge(history: &[Self::Changeset], current: &Self) -> Self::Changeset {
                #changeset_ty {
                    #(#merge_inits),*
                }
            }

            fn merge_cloud(baseline: &Self, local: &mut Self, remote: &Self) -> #CRATE::SyncResult<Self::Changeset> {
                let mut redo = <Self::Changeset as ::std::default::Default>::default();
                #(#merge_cloud_stmts)*
                Ok(redo)
            }
        }
    };

    Ok(expanded)
}

fn is_nested(field: &syn::Field) -> syn::Result<bool> {
    for attr in &field.attrs {
        if !attr.path.is_ident("syncable") {
            continue;
        }
        let parsed: syn::Ident = attr.parse_args()?;
        if parsed == "nested" {
            return Ok(true);
        }
        return Err(syn::Error::new(parsed.span(), "expected `nested`"));
    }
    Ok(false)
}
