use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Select saved import states", long_about = None)]
pub struct StateQuery {
    /// SQLite connection string
    #[arg(short, long)]
    pub db_url: String,

    /// Chain name
    #[arg(short, long)]
    pub chain: String,

    /// Only this object
    #[arg(short, long)]
    pub object: Option<String>,
}
