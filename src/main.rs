fn main() {
    tether::cli::run();
}
