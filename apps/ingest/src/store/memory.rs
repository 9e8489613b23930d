use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::category::Category;
use crate::models::resume::ResumeRecord;
use crate::store::{
    CategoryStore, CategoryUpdate, DetailsUpdate, ExtractionFields, ResumeFilter, ResumeStore,
    StoreError,
};

/// Process-local record store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryResumeStore {
    records: RwLock<HashMap<String, ResumeRecord>>,
    categories: RwLock<HashMap<String, Category>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn get(&self, id: &str) -> Result<Option<ResumeRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn create(&self, record: &ResumeRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => {
                if let Some(chunks) = &record.chunks {
                    existing.chunks = Some(chunks.clone());
                }
                existing.tags = record.tags.clone();
                if let Some(suggestions) = &record.suggestions {
                    existing.suggestions = Some(suggestions.clone());
                }
                existing.updated_at = Utc::now();
            }
            None => {
                records.insert(record.id.clone(), record.clone());
            }
        }
        Ok(())
    }

    async fn merge_extraction(
        &self,
        id: &str,
        fields: &ExtractionFields,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(false);
        };
        record.chunks = Some(fields.chunks.clone());
        record.tags = fields.tags.clone();
        if let Some(suggestions) = &fields.suggestions {
            record.suggestions = Some(suggestions.clone());
        }
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn list(&self, filter: &ResumeFilter) -> Result<Vec<ResumeRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<ResumeRecord> = records
            .values()
            .filter(|r| {
                filter
                    .owner_id
                    .as_deref()
                    .map_or(true, |owner| r.owner_id.as_deref() == Some(owner))
            })
            .filter(|r| {
                filter
                    .category_id
                    .as_deref()
                    .map_or(true, |category| r.category_id.as_deref() == Some(category))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn update_details(
        &self,
        id: &str,
        update: &DetailsUpdate,
    ) -> Result<Option<ResumeRecord>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };
        if let Some(company) = &update.company {
            record.company = Some(company.clone());
        }
        if let Some(job_title) = &update.job_title {
            record.job_title = Some(job_title.clone());
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(notes) = &update.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(category_id) = &update.category_id {
            record.category_id = Some(category_id.clone());
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl CategoryStore for MemoryResumeStore {
    async fn list_categories(&self, owner_id: Option<&str>) -> Result<Vec<Category>, StoreError> {
        let categories = self.categories.read().await;
        let mut matching: Vec<Category> = categories
            .values()
            .filter(|c| owner_id.map_or(true, |owner| c.owner_id.as_deref() == Some(owner)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn create_category(&self, category: &Category) -> Result<(), StoreError> {
        self.categories
            .write()
            .await
            .insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn update_category(
        &self,
        id: &str,
        update: &CategoryUpdate,
    ) -> Result<Option<Category>, StoreError> {
        let mut categories = self.categories.write().await;
        let Some(category) = categories.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            category.name = name.clone();
        }
        if let Some(color) = &update.color {
            category.color = color.clone();
        }
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.categories.write().await.remove(id).is_some())
    }
}
