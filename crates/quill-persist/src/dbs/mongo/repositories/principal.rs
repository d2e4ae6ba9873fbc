use mongodb::{Client, Collection, bson::doc, bson::oid::ObjectId};
use mongodb::options::ReturnDocument;

use crate::dbs::mongo::models::MongoPrincipal;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoPrincipalRepository {
    collection: Collection<MongoPrincipal>,
}

impl MongoPrincipalRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("users");
        Self { collection }
    }

    pub async fn find_principal(&self, principal_id: ObjectId) -> Result<Option<MongoPrincipal>> {
        Ok(self.collection.find_one(doc! { "_id": principal_id }).await?)
    }

    /// Single-statement conditional decrement; `None` when the balance was short
    /// or the principal is gone.
    pub async fn debit_if_sufficient(
        &self,
        principal_id: ObjectId,
        amount: i64,
    ) -> Result<Option<MongoPrincipal>> {
        let filter = doc! { "_id": principal_id, "credits": { "$gte": amount } };
        let update = doc! { "$inc": { "credits": -amount } };

        Ok(self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?)
    }
}
