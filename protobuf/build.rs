fn main() {
    println!("cargo:rerun-if-changed=./provider.proto");
    tonic_build::compile_protos("./provider.proto")
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
