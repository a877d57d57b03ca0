use super::flag;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnEntry {
    pub table_id: u32,
    pub table_name: String,
    /// `None` until the ID pass hands out a fresh number.
    pub column_id: Option<u32>,
    pub enabled: bool,
    pub column_name: String,
    /// Curator's rename; starts out equal to `column_name`.
    pub new_column_name: String,
}

impl ColumnEntry {
    pub const HEADER: [&'static str; 6] = [
        "Table_ID",
        "Table_Name",
        "Column_ID",
        "Enabled",
        "Column_Name",
        "New_Column_Name",
    ];

    pub fn discovered(
        table_id: u32,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        let column_name = column_name.into();
        Self {
            table_id,
            table_name: table_name.into(),
            column_id: None,
            enabled,
            new_column_name: column_name.clone(),
            column_name,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.table_name.clone(), self.column_name.clone())
    }

    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.table_id.to_string(),
            self.table_name.trim().to_string(),
            self.column_id.map(|id| id.to_string()).unwrap_or_default(),
            flag(self.enabled).to_string(),
            self.column_name.trim().to_string(),
            self.new_column_name.trim().to_string(),
        ]
    }
}
