// Not a supported source extension; the scanner skips it.
fn main() {
    println!("sample");
}
