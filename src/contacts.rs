use crate::api::models::{ContactEntry, ConversationId, Message};

pub const NO_MESSAGES: &str = "No messages yet";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preview {
    pub text: Option<String>,
    pub from_user: bool,
}

impl Preview {
    pub fn label(&self) -> String {
        match (&self.text, self.from_user) {
            (None, _) => NO_MESSAGES.to_string(),
            (Some(text), true) => format!("You: {text}"),
            (Some(text), false) => text.clone(),
        }
    }

    pub fn title(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: ConversationId,
    pub name: String,
    pub description: String,
    pub preview: Preview,
    pub time: String,
    pub visible: bool,
}

impl Contact {
    pub fn new(id: ConversationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            preview: Preview::default(),
            time: String::new(),
            visible: true,
        }
    }

    fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.preview.label()).to_lowercase()
    }
}

impl From<ContactEntry> for Contact {
    fn from(entry: ContactEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            description: entry.description,
            preview: Preview {
                text: entry.preview,
                from_user: entry.preview_from_user,
            },
            time: entry.time,
            visible: true,
        }
    }
}

impl From<&Contact> for ContactEntry {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            name: contact.name.clone(),
            description: contact.description.clone(),
            preview: contact.preview.text.clone(),
            preview_from_user: contact.preview.from_user,
            time: contact.time.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Unchanged,
    /// The contact left its slot and is now first; the UI plays the
    /// hide-then-show transition.
    Moved,
}

#[derive(Debug, Clone, Default)]
pub struct ContactRegistry {
    contacts: Vec<Contact>,
    active: Option<ConversationId>,
    query: String,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let mut registry = Self::new();
        registry.replace_all(contacts);
        registry
    }

    /// Reloads the list, keeping the active id and the filter when they still
    /// apply.
    pub fn replace_all(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
        if let Some(id) = self.active {
            if self.get(id).is_none() {
                self.active = None;
            }
        }
        let query = std::mem::take(&mut self.query);
        self.filter(&query);
    }

    pub fn upsert(&mut self, contact: Contact) {
        match self.contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(existing) => {
                existing.name = contact.name;
                existing.description = contact.description;
            }
            None => {
                let mut contact = contact;
                contact.visible = self.matches(&contact);
                self.contacts.push(contact);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, id: ConversationId) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn ids(&self) -> Vec<ConversationId> {
        self.contacts.iter().map(|c| c.id).collect()
    }

    fn matches(&self, contact: &Contact) -> bool {
        self.query.is_empty() || contact.search_text().contains(&self.query)
    }

    /// Case-insensitive substring filter, recomputed from scratch each call.
    pub fn filter(&mut self, query: &str) {
        self.query = query.to_lowercase();
        let query = self.query.clone();
        for contact in &mut self.contacts {
            contact.visible = query.is_empty() || contact.search_text().contains(&query);
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter().filter(|c| c.visible)
    }

    pub fn active(&self) -> Option<ConversationId> {
        self.active
    }

    pub fn active_contact(&self) -> Option<&Contact> {
        self.active.and_then(|id| self.get(id))
    }

    fn active_mut(&mut self) -> Option<&mut Contact> {
        let id = self.active?;
        self.contacts.iter_mut().find(|c| c.id == id)
    }

    pub fn set_active(&mut self, id: ConversationId) {
        self.active = Some(id);
    }

    pub fn promote(&mut self, id: ConversationId) -> Promotion {
        match self.contacts.iter().position(|c| c.id == id) {
            Some(pos) if pos > 0 => {
                let contact = self.contacts.remove(pos);
                self.contacts.insert(0, contact);
                Promotion::Moved
            }
            _ => Promotion::Unchanged,
        }
    }

    pub fn update_preview(&mut self, message: &Message) {
        if let Some(contact) = self.active_mut() {
            contact.preview = Preview {
                text: Some(message.message.clone()),
                from_user: message.is_from_user(),
            };
            contact.time = message.time.clone();
        }
    }

    pub fn reset_preview(&mut self) {
        if let Some(contact) = self.active_mut() {
            contact.preview = Preview::default();
            contact.time.clear();
        }
    }
}
