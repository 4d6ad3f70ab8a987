use serde::{Deserialize, Serialize};

/// A pet in the store
#[derive(Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    pub name: String,
    /// Age in months
    #[schema(string)]
    pub age_months: i64,
    pub tags: Vec<String>,
    pub parent: Option<Box<Pet>>,
}

#[derive(Deserialize)]
pub struct NewPet {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct Greeting {
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

#[derive(Serialize)]
pub struct Response {
    pub ok: bool,
}
