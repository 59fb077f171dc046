pub fn verbose() -> bool {
    std::env::var("ROWBATCH_VERBOSE").as_deref().unwrap_or("") == "1"
}
