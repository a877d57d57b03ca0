use super::flag;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    /// Stable across runs; `0` marks an ID that could not be read back.
    pub id: u32,
    pub name: String,
    pub enabled: bool,
    pub event: bool,
    pub series: bool,
}

impl TableEntry {
    pub const HEADER: [&'static str; 5] = ["ID", "Table Name", "Enabled", "Event", "Series"];

    /// A table seen in the database for the first time.
    pub fn discovered(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            event: false,
            series: false,
        }
    }

    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.trim().to_string(),
            flag(self.enabled).to_string(),
            flag(self.event).to_string(),
            flag(self.series).to_string(),
        ]
    }
}
