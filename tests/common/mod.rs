pub fn setup_logger() {
    use std::io::Write;

    fn tn() -> String {
        std::thread::current()
            .name()
            .unwrap_or("unknown")
            .to_owned()
    }

    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{:>5} {:12} {} {}",
                record.level(),
                tn(),
                record.target(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Warn)
        // boundary splits and fatal resolution diagnostics are
        // the interesting output when a test goes sideways
        .filter(Some("durlog"), log::LevelFilter::Debug);

    if let Ok(env) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env);
    }

    let _r = builder.try_init();
}
