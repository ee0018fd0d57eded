use bson::doc;
use eyre::{Context as _, Result};
use log::info;
use mongodb::{options::ClientOptions, Client, Collection, Database};

const APP_NAME: &str = "sportchain";

/// Connection to the local-state database.
#[derive(Clone)]
pub struct Db {
    client: Client,
    name: String,
}

impl Db {
    pub(crate) async fn connect(uri: &str, name: &str) -> Result<Db> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("Invalid MongoDB connection string")?;
        options.app_name = Some(APP_NAME.to_owned());
        let client = Client::with_options(options).context("Failed to connect to MongoDB")?;
        let db = Db {
            client,
            name: name.to_owned(),
        };
        db.ping().await?;
        info!("Connected to database {}", name);
        Ok(db)
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.name)
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().collection(name)
    }

    pub async fn ping(&self) -> Result<()> {
        self.database()
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to ping MongoDB")?;
        Ok(())
    }
}
