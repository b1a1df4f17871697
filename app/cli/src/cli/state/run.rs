use engine::checkpointer::Checkpointer;
use eyre::Result;
use store::client::Client;
use store::import_state::store::Store;

use crate::cli::state::args::StateQuery;
use crate::cli::state::response::ImportStateResponse;

pub async fn select(query: &StateQuery) -> Result<()> {
    let client = Client::init(&query.db_url).await?;
    let checkpointer = Checkpointer::new(Store::new(client), &query.chain);

    let states = match &query.object {
        Some(object) => match checkpointer.load(object).await? {
            Some(state) => vec![(object.clone(), state)],
            None => vec![],
        },
        None => checkpointer.load_all().await?,
    };

    if states.is_empty() {
        println!("No Import States Found")
    } else {
        let response: Vec<ImportStateResponse> =
            states.into_iter().map(|(key, state)| ImportStateResponse(key, state)).collect();
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}
