fn main() {
    codeplay_lib::run()
}
