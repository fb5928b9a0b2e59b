use assetkit_core::{AssetsProvider, FileType};
use tabled::{Table, Tabled};

#[derive(Tabled, Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub kind: String,
}

pub fn collect_rows(
    provider: &dyn AssetsProvider,
    prefix: &str,
) -> Result<Vec<EntryRow>, Box<dyn std::error::Error>> {
    let mut rows = Vec::new();
    provider.for_each_file(prefix, &mut |name, kind| {
        rows.push(EntryRow {
            name: name.to_string(),
            kind: match kind {
                FileType::Regular => "file",
                FileType::Directory => "dir",
            }
            .to_string(),
        })
    })?;
    Ok(rows)
}

pub fn run(provider: &dyn AssetsProvider, prefix: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rows = collect_rows(provider, prefix)?;
    if rows.is_empty() {
        println!("No entries under '{}' in {}.", prefix, provider.debug_name());
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}
