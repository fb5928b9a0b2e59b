use assetkit_core::{AssetsProvider, UpToDate};

pub fn describe(state: UpToDate) -> &'static str {
    match state {
        UpToDate::Yes => "up to date",
        UpToDate::No => "changed since opened",
        UpToDate::Always => "never checked (read-only or unstamped)",
    }
}

pub fn run(provider: &dyn AssetsProvider) -> Result<(), Box<dyn std::error::Error>> {
    println!("Source: {}", provider.debug_name());
    if let Some(path) = provider.path() {
        println!("Path:   {}", path);
    }
    println!("State:  {}", describe(provider.is_up_to_date()));
    Ok(())
}
