//! Person identity management.
//!
//! Persons carry the identity shared by insured persons and doctors, plus an optional profile
//! photo kept in the content-addressed media store. A person registered as insured or doctor
//! cannot be deleted directly; those services remove the identity together with the role record.

use super::compensate;
use crate::constants::MAX_PHOTO_BYTES;
use crate::models::{Doctor, Insured, Media, Person, PersonInput};
use crate::store::RecordStore;
use crate::{CoreError, CoreResult};
use chrono::Utc;
use secu_files::MediaStore;
use secu_uuid::RecordId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PersonService {
    store: Arc<RecordStore>,
    media: MediaStore,
}

impl PersonService {
    pub fn new(store: Arc<RecordStore>, media: MediaStore) -> Self {
        Self { store, media }
    }

    /// Validates and stores a new person.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if a mandatory field is missing or malformed
    /// - [`CoreError::Conflict`] if the email is already registered
    pub fn create(&self, input: PersonInput) -> CoreResult<Person> {
        let now = Utc::now();
        let fields = input.validate(now.date_naive())?;
        let person = self
            .store
            .create(Person::new(RecordId::new(), fields, now))?;
        tracing::info!("created person {}", person.id);
        Ok(person)
    }

    pub fn get(&self, id: &RecordId) -> CoreResult<Person> {
        self.store.get(id)
    }

    pub fn list(&self) -> CoreResult<Vec<Person>> {
        self.store.list()
    }

    pub fn exists(&self, id: &RecordId) -> CoreResult<bool> {
        self.store.exists::<Person>(id)
    }

    /// Replaces the identity fields of an existing person.
    pub fn update(&self, id: &RecordId, input: PersonInput) -> CoreResult<Person> {
        let mut person: Person = self.store.get(id)?;
        person.apply(input.validate(Utc::now().date_naive())?);
        let person = self.store.update(person)?;
        tracing::info!("updated person {}", person.id);
        Ok(person)
    }

    /// Case-insensitive match on first or last name.
    pub fn search_by_name(&self, query: &str) -> CoreResult<Vec<Person>> {
        if query.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "search query cannot be empty".into(),
            ));
        }
        self.store.find_where(|p: &Person| p.matches_name(query))
    }

    pub fn find_by_email(&self, email: &str) -> CoreResult<Option<Person>> {
        self.store
            .find_by_unique_key("email", &email.trim().to_lowercase())
    }

    pub fn find_by_phone(&self, phone: &str) -> CoreResult<Option<Person>> {
        let phone = phone.trim();
        self.store
            .find_one_where(|p: &Person| p.phone.as_str() == phone)
    }

    /// Deletes a person who is neither insured nor a doctor.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the person does not exist
    /// - [`CoreError::Conflict`] if the person is registered as insured or doctor
    pub fn delete(&self, id: &RecordId) -> CoreResult<()> {
        let person: Person = self.store.get(id)?;
        if self.store.exists::<Insured>(id)? {
            return Err(CoreError::Conflict(format!(
                "person {id} is registered as insured; delete the insured instead"
            )));
        }
        if self.store.exists::<Doctor>(id)? {
            return Err(CoreError::Conflict(format!(
                "person {id} is registered as doctor; delete the doctor instead"
            )));
        }
        self.remove_identity(&person)?;
        tracing::info!("deleted person {id}");
        Ok(())
    }

    /// Deletes the person record and its photo without checking role records.
    pub(crate) fn remove_identity(&self, person: &Person) -> CoreResult<()> {
        self.store.delete(person)?;
        if let Some(photo_id) = &person.photo_id {
            self.release_media(photo_id)?;
        }
        Ok(())
    }

    /// Stores `bytes` as the person's profile photo, replacing any previous one.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the person does not exist
    /// - [`CoreError::InvalidArgument`] if the content is empty, too large or not an image
    pub fn upload_photo(
        &self,
        id: &RecordId,
        bytes: &[u8],
        filename: &str,
    ) -> CoreResult<Person> {
        let mut person: Person = self.store.get(id)?;

        if bytes.is_empty() {
            return Err(CoreError::InvalidArgument("photo is empty".into()));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(CoreError::InvalidArgument(format!(
                "photo exceeds {MAX_PHOTO_BYTES} bytes"
            )));
        }
        match MediaStore::detect_media_type(bytes) {
            Some(mime) if mime.starts_with("image/") => {}
            Some(mime) => {
                return Err(CoreError::InvalidArgument(format!(
                    "photo must be an image, got {mime}"
                )))
            }
            None => {
                return Err(CoreError::InvalidArgument(
                    "photo content is not a recognised image".into(),
                ))
            }
        }

        let file = self.media.add_bytes(bytes, filename)?;
        let now = Utc::now();
        let media = self.store.create(Media {
            id: RecordId::new(),
            file,
            created_at: now,
            version: 0,
        })?;

        let previous = person.photo_id.replace(media.id.clone());
        let person = match self.store.update(person) {
            Ok(person) => person,
            Err(e) => return Err(compensate("upload photo", e, || self.release_media(&media.id))),
        };

        if let Some(previous) = previous {
            self.release_media(&previous)?;
        }
        tracing::info!("stored photo {} for person {}", media.file.hash, person.id);
        Ok(person)
    }

    /// The person's photo record and its bytes.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the person does not exist or has no photo.
    pub fn photo(&self, id: &RecordId) -> CoreResult<(Media, Vec<u8>)> {
        let person: Person = self.store.get(id)?;
        let photo_id = person
            .photo_id
            .ok_or_else(|| CoreError::NotFound(format!("person {id} has no photo")))?;
        let media: Media = self.store.get(&photo_id)?;
        let bytes = self.media.read(&media.file.hash)?;
        Ok((media, bytes))
    }

    /// Removes the person's photo. Returns `false` if there was none.
    pub fn delete_photo(&self, id: &RecordId) -> CoreResult<bool> {
        let mut person: Person = self.store.get(id)?;
        let Some(photo_id) = person.photo_id.take() else {
            return Ok(false);
        };
        self.store.update(person)?;
        self.release_media(&photo_id)?;
        Ok(true)
    }

    /// Deletes a media record, and its bytes once nothing else points at them.
    fn release_media(&self, media_id: &RecordId) -> CoreResult<()> {
        let Some(media) = self.store.find_by_id::<Media>(media_id)? else {
            return Ok(());
        };
        self.store.delete(&media)?;
        let shared = self
            .store
            .count_where(|m: &Media| m.file.hash == media.file.hash)?;
        if shared == 0 {
            self.media.remove(&media.file.hash)?;
        }
        Ok(())
    }
}
