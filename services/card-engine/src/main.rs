use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use bank_adapters::{BankAccountAdapter, FineractAdapter, MockBankAdapter};
use card_core::store::{CardStore, MappingStore, ProcessorMappingStore, TransactionStore};
use card_engine::{
    config::Config, handlers, stores::postgres, stores::PgStores, AuthorizationService,
    CardService, IssuanceService, ProcessorAdapter, SettlementService,
};
use dotenv::dotenv;
use rules_engine::RulesEngine;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .json()
        .init();

    info!("Starting Card Engine...");

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Configuration loaded successfully");

    let pool = postgres::create_pool(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to database");
    postgres::health_check(&pool)
        .await
        .expect("Database health check failed");

    info!("Database connected successfully");

    let stores = Arc::new(PgStores::new(pool));
    let transaction_store: Arc<dyn TransactionStore> = stores.clone();
    let card_store: Arc<dyn CardStore> = stores.clone();
    let mapping_store: Arc<dyn MappingStore> = stores.clone();
    let processor_mapping_store: Arc<dyn ProcessorMappingStore> = stores.clone();

    let bank: Arc<dyn BankAccountAdapter> = match config.bank.adapter.as_str() {
        "fineract" => Arc::new(FineractAdapter::new(&config.bank.fineract, stores.clone())),
        _ => Arc::new(MockBankAdapter::new()),
    };
    info!("Bank adapter bound: {}", bank.adapter_name());

    let rules = RulesEngine::standard(transaction_store.clone(), &config.rules);

    let authorizations = Arc::new(AuthorizationService::new(
        transaction_store.clone(),
        card_store.clone(),
        mapping_store.clone(),
        bank.clone(),
        rules,
    ));
    let settlements = Arc::new(SettlementService::new(
        transaction_store.clone(),
        bank.clone(),
    ));
    let cards = Arc::new(CardService::new(card_store.clone()));
    let issuance = Arc::new(IssuanceService::new(
        card_store.clone(),
        mapping_store.clone(),
        bank.clone(),
    ));
    let processor = Arc::new(ProcessorAdapter::new(
        authorizations.clone(),
        settlements.clone(),
        card_store.clone(),
        processor_mapping_store.clone(),
    ));

    info!("Services initialized, processor adapter: {}", processor.processor_name());

    let server_config = config.server.clone();
    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    let authorizations = web::Data::new(authorizations);
    let settlements = web::Data::new(settlements);
    let cards = web::Data::new(cards);
    let issuance = web::Data::new(issuance);
    let processor = web::Data::new(processor);
    let bank = web::Data::new(bank);

    HttpServer::new(move || {
        App::new()
            .app_data(authorizations.clone())
            .app_data(settlements.clone())
            .app_data(cards.clone())
            .app_data(issuance.clone())
            .app_data(processor.clone())
            .app_data(bank.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await
}
