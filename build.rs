#[cfg(not(any(feature = "rustls-marker", feature = "native-marker")))]
compile_error!(
    "Skylark's signaling channel needs a TLS backend for its websocket: \
    either the `rustls` or `native` feature must be selected.\n\
    - `rustls` uses Rustls, a pure Rust TLS-implemenation.\n\
    - `native` uses SChannel on Windows, Secure Transport on macOS, \
    and OpenSSL on other platforms.\n\
    If you are unsure, go with `rustls`."
);

fn main() {}
