use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto");

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .file_descriptor_set_path(out_dir.join("fleet_v1_descriptor.bin"))
        .compile_protos(&["proto/fleet/v1/fleet.proto"], &["proto"])?;

    Ok(())
}
