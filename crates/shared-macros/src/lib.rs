extern crate proc_macro;

use std::{fs, path::Path};

use proc_macro::TokenStream;
use quote::quote;
use syn::{LitStr, parse_macro_input};

/// Embed a directory of SQL migration files at compile time.
///
/// Takes a path relative to the invoking crate's manifest directory and
/// expands to a `BTreeMap<&'static str, BTreeMap<&'static str, &'static str>>`
/// keyed by backend, then by migration filename. Files tagged with a backend
/// (e.g. `0001_init.sqlite.up.sql`) land only in that backend's map; untagged
/// files land in every backend's map.
#[proc_macro]
pub fn load_sql_migrations(input: TokenStream) -> TokenStream {
    let path_lit = parse_macro_input!(input as LitStr);
    let path_str = path_lit.value();

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let migrations_path = Path::new(&manifest_dir).join(&path_str);

    let supported_backends = vec!["sqlite"];

    let mut backend_map = std::collections::BTreeMap::<String, Vec<(String, String)>>::new();

    for entry in fs::read_dir(&migrations_path).expect("Failed to read migrations directory") {
        let entry = entry.expect("Invalid dir entry");
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let extension = path.extension().and_then(|e| e.to_str());
        if extension != Some("sql") {
            continue;
        }

        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            let contents = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Failed to read migration file {file_name}: {e}"));

            let matched_backend = supported_backends
                .iter()
                .find(|backend| file_name.contains(&format!(".{backend}.")))
                .copied();

            if let Some(backend) = matched_backend {
                backend_map
                    .entry(backend.to_string())
                    .or_default()
                    .push((file_name.to_string(), contents));
            } else {
                // No specific backend mentioned — add to ALL backends
                for backend in &supported_backends {
                    backend_map
                        .entry(backend.to_string())
                        .or_default()
                        .push((file_name.to_string(), contents.clone()));
                }
            }
        }
    }

    let backend_tokens = backend_map.iter().map(|(backend, files)| {
        let file_tokens = files.iter().map(|(name, contents)| {
            quote! {
                map.insert(#name, #contents);
            }
        });

        quote! {
            {
                let mut map = ::std::collections::BTreeMap::new();
                #(#file_tokens)*
                migrations.insert(#backend, map);
            }
        }
    });

    let expanded = quote! {
        {
            let mut migrations = ::std::collections::BTreeMap::new();
            #(#backend_tokens)*
            migrations
        }
    };

    TokenStream::from(expanded)
}
