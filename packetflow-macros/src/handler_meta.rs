use darling::FromDeriveInput;
use syn::DeriveInput;

/// Parsed attributes from #[handler(...)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(handler), supports(struct_any))]
pub struct HandlerArgs {
    pub ident: syn::Ident,

    /// Registry id; defaults to the lowercased struct name
    #[darling(default)]
    pub name: Option<String>,

    #[darling(default)]
    pub category: Option<String>,

    /// Declared input ports, one `input = "..."` per port
    #[darling(multiple, rename = "input")]
    pub inputs: Vec<String>,

    /// Declared output ports, one `output = "..."` per port
    #[darling(multiple, rename = "output")]
    pub outputs: Vec<String>,
}

impl HandlerArgs {
    pub fn handler_id(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.ident.to_string().to_lowercase())
    }
}

pub fn parse_handler_info(input: &DeriveInput) -> darling::Result<HandlerArgs> {
    HandlerArgs::from_derive_input(input)
}
