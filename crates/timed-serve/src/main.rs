fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::current_dir()?;
    let mut builder = timed_serve::ServerBuilder::new(&path);
    builder
        .hostname("127.0.0.1")
        .idle_timeout(std::time::Duration::from_secs(60));
    let server = builder.build()?;

    println!("Serving {}", path.display());
    println!("See http://{}", server.addr());
    println!("Stops after a minute without requests");

    println!("{}", server.serve());
    Ok(())
}
