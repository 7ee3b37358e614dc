//! Derive macro for `syncable::RecordFields`, generated as
//! `#[derive(SyncableRecord)]`.
//!
//! Mirrors the `CRATE`-token trick in `artifice-macros`: generated code
//! refers to the `syncable` crate by name rather than assuming it's
//! imported under any particular alias.

extern crate proc_macro;

use quote::{quote, ToTokens};

mod record;

struct CrateName;
const CRATE: CrateName = CrateName;

impl ToTokens for CrateName {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        tokens.extend(quote!(syncable));
    }
}

#[proc_macro_derive(SyncableRecord, attributes(syncable))]
pub fn derive_syncable_record(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    record::derive(&input).unwrap_or_else(|err| err.to_compile_error()).into()
}
