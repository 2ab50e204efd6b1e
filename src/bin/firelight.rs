fn main() {
    firelight::cli::run();
}
