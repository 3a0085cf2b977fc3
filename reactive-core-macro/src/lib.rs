//! `#[derive(Tracked)]`: generates a per-field reactive wrapper for a plain
//! struct, the compile-time stand-in for a runtime `Proxy`.
//!
//! `#[derive(Tracked)] struct Point { x: f64, y: f64 }` generates a
//! `PointTracked` handle with a `new(Point) -> Self` constructor and, per
//! field, a getter (`x() -> f64`) and setter (`set_x(f64)`) wired to their
//! own dedicated trigger signal via `reactive_core::state`. Reading `x()`
//! never tracks `y`'s trigger and vice versa.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

#[proc_macro_derive(Tracked)]
pub fn derive_tracked(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Tracked only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Tracked can only be derived for structs",
            ))
        }
    };

    let struct_name = &input.ident;
    let wrapper_name = format_ident!("{}Tracked", struct_name);

    let field_idents: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();
    let field_types: Vec<_> = fields.iter().map(|f| f.ty.clone()).collect();
    let trigger_idents: Vec<_> = field_idents
        .iter()
        .map(|id| format_ident!("{}_trigger", id))
        .collect();
    let setter_idents: Vec<_> = field_idents
        .iter()
        .map(|id| format_ident!("set_{}", id))
        .collect();
    let with_idents: Vec<_> = field_idents
        .iter()
        .map(|id| format_ident!("with_{}", id))
        .collect();

    let expanded = quote! {
        /// Per-field reactive handle generated for #struct_name.
        ///
        /// Cheap to copy: every field lives behind its own small `Copy`
        /// signal handle, just like a hand-written set of signals would.
        #[derive(Clone, Copy)]
        #[allow(non_snake_case)]
        pub struct #wrapper_name {
            __data: reactive_core::signal::Signal<#struct_name>,
            #( #trigger_idents: reactive_core::signal::Signal<u64>, )*
        }

        #[allow(non_snake_case, clippy::all)]
        impl #wrapper_name {
            pub fn new(initial: #struct_name) -> Self {
                Self {
                    __data: reactive_core::signal::signal(initial),
                    #( #trigger_idents: reactive_core::state::new_field_trigger(), )*
                }
            }

            #(
                #[doc = "Track this field and return a clone of its current value."]
                pub fn #field_idents(&self) -> #field_types
                where
                    #field_types: Clone,
                {
                    reactive_core::state::track_field(self.#trigger_idents);
                    self.__data.with(|v| v.#field_idents.clone())
                }

                #[doc = "Track this field and run `f` against a borrow of it, without cloning."]
                pub fn #with_idents<R>(&self, f: impl FnOnce(&#field_types) -> R) -> R {
                    reactive_core::state::track_field(self.#trigger_idents);
                    self.__data.with(|v| f(&v.#field_idents))
                }

                #[doc = "Overwrite this field, notifying only its own readers."]
                pub fn #setter_idents(&self, value: #field_types) {
                    self.__data.update(|v| v.#field_idents = value);
                    reactive_core::state::bump_field(self.#trigger_idents);
                }
            )*

            /// Return the raw underlying #struct_name without tracking any
            /// field, the same value that [`Self::new`] was constructed
            /// from — the raw-target accessor for this handle.
            pub fn unwrap_value(&self) -> #struct_name
            where
                #struct_name: Clone,
            {
                self.__data.peek()
            }
        }

        impl reactive_core::state::TrackedFields for #struct_name {
            type Handle = #wrapper_name;

            fn into_tracked(self) -> Self::Handle {
                #wrapper_name::new(self)
            }
        }
    };

    Ok(expanded)
}
