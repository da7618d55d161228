fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=../proto/botrpc.proto");

    // Ensure a protoc binary is available even when the system has none
    // installed, using the vendored binary. Respects an externally-provided
    // PROTOC if set.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", path);
        }
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["../proto/botrpc.proto"], &["../proto"])?;
    Ok(())
}
