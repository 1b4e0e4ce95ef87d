use proc_macro::TokenStream;
use quote::quote;
use syn::{parse, parse_macro_input, DeriveInput};

#[proc_macro_derive(RegisterSerde)]
/// Derived on a 4 byte `packed_struct` to move it through the transport as one 32-bit register word
pub fn derive_register_serde(tokens: TokenStream) -> TokenStream {
    let input = parse_macro_input!(tokens as DeriveInput);
    let block_name = input.ident;
    let generated = quote! {
        impl crate::transport::Serialize for #block_name {
            fn serialize(&self) -> u32 {
                u32::from_be_bytes(
                    packed_struct::PackedStruct::pack(self)
                        .expect("Packing failed, this shouldn't happen"),
                )
            }
        }

        impl crate::transport::Deserialize for #block_name {
            fn deserialize(word: u32) -> Result<Self, crate::transport::Error> {
                Ok(<Self as packed_struct::PackedStruct>::unpack(&word.to_be_bytes())?)
            }
        }
    };
    TokenStream::from(generated)
}

/// Binds a register layout to its byte offset inside the register page
#[proc_macro_attribute]
pub fn offset(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = match parse::<syn::Lit>(attr).expect("Error parsing attribute") {
        syn::Lit::Int(v) => v,
        _ => panic!("The offset must be a literal integer"),
    };
    let num = attr;
    // Get the struct name this offset is for
    let item = parse_macro_input!(item as DeriveInput);
    let ident = item.clone().ident;

    let generated = quote! {
        impl crate::peripherals::Offset for #ident {
            const OFFSET: usize = #num;
        }
        #item
    };
    TokenStream::from(generated)
}
