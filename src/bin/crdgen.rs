//! Prints the `Certificate` CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run --bin crdgen > config/crd/certificate.yaml
//! ```

use certificate_controller::crd::Certificate;
use kube::core::CustomResourceExt;

fn main() {
    let crd = Certificate::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the Rust types in src/crd/ and regenerate instead");
            println!("#");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
