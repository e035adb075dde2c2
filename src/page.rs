use std::collections::HashMap;

use crate::collection::ElementsCollection;
use crate::element::ElementHandle;
use crate::errors::Error;
use crate::selector::Selector;
use crate::session::Session;

#[derive(Debug, Clone, Copy)]
enum FieldShape {
    Element,
    Collection,
}

/// Declarative page object: named fields mapped to selectors, built once
/// per page type and instantiated per session. The produced handles are as
/// lazy as hand-made ones; the schema only fixes names and selectors up
/// front so tests refer to `"save button"` instead of raw CSS.
#[derive(Default)]
pub struct PageSchema {
    fields: Vec<(String, Selector, FieldShape)>,
}

impl PageSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a single-element field.
    pub fn element(mut self, name: impl Into<String>, selector: impl Into<Selector>) -> Self {
        self.fields
            .push((name.into(), selector.into(), FieldShape::Element));
        self
    }

    /// Declares a collection field.
    pub fn collection(mut self, name: impl Into<String>, selector: impl Into<Selector>) -> Self {
        self.fields
            .push((name.into(), selector.into(), FieldShape::Collection));
        self
    }

    /// Instantiates the schema against a session. Every field becomes a
    /// lazy handle aliased with its field name, so failures cite the name.
    pub fn build(&self, session: &Session) -> PageObject {
        let mut elements = HashMap::new();
        let mut collections = HashMap::new();
        for (name, selector, shape) in &self.fields {
            match shape {
                FieldShape::Element => {
                    let handle = session.find(selector.clone()).as_(name.clone());
                    elements.insert(name.clone(), handle);
                }
                FieldShape::Collection => {
                    let handle = session.find_all(selector.clone()).as_(name.clone());
                    collections.insert(name.clone(), handle);
                }
            }
        }
        PageObject {
            elements,
            collections,
        }
    }
}

/// Handles produced from a `PageSchema`, looked up by field name.
pub struct PageObject {
    elements: HashMap<String, ElementHandle>,
    collections: HashMap<String, ElementsCollection>,
}

impl PageObject {
    pub fn element(&self, name: &str) -> Result<&ElementHandle, Error> {
        self.elements
            .get(name)
            .ok_or_else(|| Error::UnknownPageField(name.to_string()))
    }

    pub fn collection(&self, name: &str) -> Result<&ElementsCollection, Error> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::UnknownPageField(name.to_string()))
    }
}

#[cfg(test)]
#[path = "page_test.rs"]
mod page_test;
