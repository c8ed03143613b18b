use expense_conversation_engine::{
    categories::CategoryRepo,
    engine::ExpenseFlowEngine,
    models::{DateChoice, Event},
    profile::InMemoryProfiles,
    rates::RateResolver,
    store::{ExpenseStore, InMemoryExpenseStore, PgExpenseStore},
    transport::RecordingTransport,
};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Expense Conversation Engine starting");

    // Pick a record store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn ExpenseStore> = match env::var("POSTGRES_URL")
        .or_else(|_| env::var("DATABASE_URL"))
    {
        Ok(url) => match PgExpenseStore::connect_lazy(&url) {
            Ok(store) => {
                info!("Expense store backend: postgres");
                Arc::new(store)
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres store, falling back to in-memory: {}",
                    error
                );
                Arc::new(InMemoryExpenseStore::new())
            }
        },
        Err(_) => {
            info!("Expense store backend: in-memory");
            Arc::new(InMemoryExpenseStore::new())
        }
    };

    let transport = Arc::new(RecordingTransport::new());
    let engine = ExpenseFlowEngine::new(
        store,
        transport.clone(),
        Arc::new(InMemoryProfiles::new()),
        CategoryRepo::with_defaults(),
        RateResolver::with_default_providers(),
    );

    // Walk a sample conversation through the full entry pipeline
    let user_id = 1;
    engine.start_entry(user_id).await?;
    engine
        .handle_event(user_id, Event::DateChoice(DateChoice::Today))
        .await?;
    engine
        .handle_event(user_id, Event::CategoryChoice("Food".to_string()))
        .await?;
    engine
        .handle_event(user_id, Event::AmountText("12.50".to_string()))
        .await?;
    engine
        .handle_event(user_id, Event::CommentText("Lunch".to_string()))
        .await?;

    println!("\n=== CONVERSATION TRANSCRIPT ===");
    for (i, item) in transport.sent().await.iter().enumerate() {
        println!("  {}: {:?}", i + 1, item);
    }

    Ok(())
}
