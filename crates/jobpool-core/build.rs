/// Builds the gRPC client and server code for the `jobpool.proto` definition
/// using `tonic-prost-build`.
///
/// The generated module contains the `Worker` service traits (server and
/// client) together with the `JobRequest` and `JobResponse` messages. A
/// file descriptor set is written alongside so the worker can expose gRPC
/// reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/jobpool.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// This function will `panic!` if code generation fails.
///
/// # Output
///
/// Generated code is accessible in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("jobpool");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("jobpool_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/jobpool.proto");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/jobpool.proto"], &["proto"])
        .unwrap();
}
