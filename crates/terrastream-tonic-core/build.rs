/// Builds the gRPC client and server code for `proto/terrastream.proto`.
///
/// Alongside the message and service modules, a file descriptor set is
/// written to `OUT_DIR` so the server can register it with
/// `tonic-reflection`.
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or code generation fails.
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("terrastream");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("terrastream_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    // Stable key order for boundary and auxiliary-column maps.
    config
        .btree_map([
            ".terrastream.ColumnarData.additional_data",
            ".terrastream.GetDatasetPageResponse.boundaries",
            ".terrastream.DataPoint.metadata",
        ])
        .file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/terrastream.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/terrastream.proto"], &["proto"])
        .unwrap();
}
