//! Generates Swift, Kotlin and Python bindings from the compiled `credman` library.
//!
//! ```sh
//! cargo run -p uniffi-bindgen -- generate --library target/release/libcredman.so \
//!     --language kotlin --out-dir kotlin/
//! ```

fn main() {
    uniffi::uniffi_bindgen_main();
}
