//! Outbound file and notification payloads handed to collaborators

/// A file with the name it should be stored or attached under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub content: Vec<u8>,
    pub file_name: String,
}

/// File handed to the upload service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub content: Vec<u8>,
    pub extension: String,
    pub file_name: String,
}

/// Message delivered to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<NamedFile>,
}
