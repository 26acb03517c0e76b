use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod handler_meta;
use handler_meta::parse_handler_info;

/// Registers a handler type with the runtime registry.
///
/// The type must implement `Default` and `crate::core::Handler`. The derive
/// generates an inherent `handler_metadata()` constructor and an inventory
/// submission so the handler can be resolved by name, including from inside
/// an isolated worker process.
#[proc_macro_derive(FlowHandler, attributes(handler))]
pub fn derive_flow_handler(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_handler_info(&input) {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };

    let struct_name = &input.ident;
    let handler_id = info.handler_id();
    let category = info.category.clone().unwrap_or_else(|| "general".to_string());
    let inputs = info.inputs.iter();
    let outputs = info.outputs.iter();

    let mod_name = syn::Ident::new(
        &format!("__handler_registration_{}", struct_name.to_string().to_lowercase()),
        struct_name.span(),
    );

    let expanded = quote! {
        impl #struct_name {
            /// Registry entry for this handler type.
            pub fn handler_metadata() -> crate::registry::HandlerMetadata {
                crate::registry::HandlerMetadata {
                    id: #handler_id.to_string(),
                    category: #category.to_string(),
                    inputs: vec![#(#inputs.to_string()),*],
                    outputs: vec![#(#outputs.to_string()),*],
                    factory: ::std::rc::Rc::new(|| -> ::std::boxed::Box<dyn crate::core::Handler> {
                        ::std::boxed::Box::new(#struct_name::default())
                    }),
                }
            }
        }

        #[doc(hidden)]
        mod #mod_name {
            use super::*;

            ::inventory::submit! {
                crate::registry::HandlerMetadataFactoryWrapper(#struct_name::handler_metadata)
            }
        }
    };

    TokenStream::from(expanded)
}
