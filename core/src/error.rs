use thiserror::Error;

/// Failure to turn the operations workbook into an observation table.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Data file not found: {path}")]
    FileNotFound { path: String },

    #[error("Cannot open workbook {path}: {message}")]
    Workbook { path: String, message: String },

    #[error("Sheet '{sheet}' not found (available: {available})")]
    SheetNotFound { sheet: String, available: String },

    #[error("Sheet '{sheet}' has no header row")]
    EmptySheet { sheet: String },

    #[error("Sheet '{sheet}' is missing column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Sheet '{sheet}' row {row}: cannot parse date '{value}'")]
    InvalidDate { sheet: String, row: usize, value: String },

    #[error("Sheet '{sheet}' row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        sheet:  String,
        row:    usize,
        column: String,
        value:  String,
    },
}

/// Failure to hand an alert card to the chat webhook.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("TEAMS_WEBHOOK_URL is not configured; notifications are disabled")]
    MissingWebhook,

    #[error("Webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook rejected the notification with status {status}")]
    Rejected { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Refused access to the dashboard. Messages are shown to the user as-is.
#[derive(Error, Debug)]
pub enum AccessDenied {
    #[error("Fichier d'autorisation introuvable : {path}")]
    AllowListMissing { path: String },

    #[error("Fichier d'autorisation illisible : {path} ({source})")]
    AllowListUnreadable {
        path:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("Veuillez saisir une adresse email.")]
    EmptyEmail,

    #[error("Email non autorisé.")]
    NotAllowed { email: String },

    #[error("Désolé, cet email n'est pas autorisé pour la vue AGI.")]
    NotAllowedForAgi { email: String },

    #[error("Veuillez vous connecter au tableau de bord.")]
    NotLoggedIn,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Access(#[from] AccessDenied),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
