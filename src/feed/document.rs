//! In-memory XML tree for a single RSS document.
//!
//! Nodes live in an arena owned by [`FeedDocument`]; every parent holds the
//! ordered list of its children's ids. Removing a node is a single detach
//! from its parent's child list, after which the subtree is released. Ids of
//! other nodes stay valid across removals, so a traversal may hold on to a
//! successor id while the current item is being removed.
use quick_xml::events::{BytesCData, BytesDecl, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

/// Errors that can occur while parsing, inspecting, or serializing a feed.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The input is not well-formed XML.
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// The document is well-formed but lacks the expected `<rss>/<channel>` shape.
    #[error("Unexpected feed structure: {0}")]
    Structure(&'static str),

    /// Writing the tree back out failed.
    #[error("Failed to serialize document: {0}")]
    Write(String),

    /// The item handle refers to a node that was already removed.
    #[error("Item is no longer part of the document")]
    Detached,
}

/// Ids are handed out in document order and nodes are never inserted after
/// parsing, so every child list is sorted by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NodeId(usize);

/// Handle to an `<item>` element of the channel.
///
/// Handles stay valid for the lifetime of the document; after the item is
/// removed, lookups through the handle return [`DocumentError::Detached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item(NodeId);

#[derive(Debug)]
enum NodeKind {
    Element {
        start: BytesStart<'static>,
        self_closing: bool,
    },
    Text(BytesText<'static>),
    CData(BytesCData<'static>),
    Comment(BytesText<'static>),
    ProcessingInstruction(BytesPI<'static>),
    Declaration(BytesDecl<'static>),
    DocType(BytesText<'static>),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed feed document.
#[derive(Debug)]
pub struct FeedDocument {
    nodes: Vec<Option<Node>>,
    /// Prolog, root element, and trailing misc nodes in document order.
    top_level: Vec<NodeId>,
}

impl FeedDocument {
    /// Parses raw bytes into a document tree.
    ///
    /// Whitespace text is kept so the output keeps the input's indentation.
    /// Besides quick-xml's own checks, the document is rejected if an element
    /// is left unclosed, if there is more than one root element, or if
    /// non-whitespace text appears outside the root.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(bytes);
        let mut doc = FeedDocument {
            nodes: Vec::new(),
            top_level: Vec::new(),
        };
        let mut open: Vec<NodeId> = Vec::new();
        let mut has_root = false;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                DocumentError::Parse(format!("{} (at byte {})", e, reader.buffer_position()))
            })?;
            let parent = open.last().copied();

            match event {
                Event::Start(e) | Event::Empty(e) if parent.is_none() && has_root => {
                    return Err(DocumentError::Parse(format!(
                        "unexpected second root element <{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                Event::Start(e) => {
                    has_root |= parent.is_none();
                    let id = doc.attach(
                        parent,
                        NodeKind::Element {
                            start: e.into_owned(),
                            self_closing: false,
                        },
                    );
                    open.push(id);
                }
                Event::Empty(e) => {
                    has_root |= parent.is_none();
                    doc.attach(
                        parent,
                        NodeKind::Element {
                            start: e.into_owned(),
                            self_closing: true,
                        },
                    );
                }
                Event::End(e) => {
                    if open.pop().is_none() {
                        return Err(DocumentError::Parse(format!(
                            "unmatched closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                }
                Event::Text(e) => {
                    if parent.is_none() && !is_whitespace(&e) {
                        return Err(DocumentError::Parse(
                            "text content outside the root element".to_string(),
                        ));
                    }
                    doc.attach(parent, NodeKind::Text(e.into_owned()));
                }
                Event::CData(e) => {
                    if parent.is_none() {
                        return Err(DocumentError::Parse(
                            "CDATA section outside the root element".to_string(),
                        ));
                    }
                    doc.attach(parent, NodeKind::CData(e.into_owned()));
                }
                Event::Comment(e) => {
                    doc.attach(parent, NodeKind::Comment(e.into_owned()));
                }
                Event::PI(e) => {
                    doc.attach(parent, NodeKind::ProcessingInstruction(e.into_owned()));
                }
                Event::Decl(e) => {
                    doc.attach(parent, NodeKind::Declaration(e.into_owned()));
                }
                Event::DocType(e) => {
                    doc.attach(parent, NodeKind::DocType(e.into_owned()));
                }
                Event::Eof => {
                    if let Some(&id) = open.last() {
                        let name = doc.element_name(id).unwrap_or_default();
                        return Err(DocumentError::Parse(format!(
                            "unclosed element <{}> at end of input",
                            String::from_utf8_lossy(name)
                        )));
                    }
                    break;
                }
            }
            buf.clear();
        }

        tracing::debug!(nodes = doc.nodes.len(), "Parsed feed document");
        Ok(doc)
    }

    /// Returns the `<item>` elements directly under `<channel>`, in document order.
    pub fn channel_items(&self) -> Result<Vec<Item>, DocumentError> {
        let channel = self.channel()?;
        Ok(self
            .children(channel)
            .iter()
            .copied()
            .filter(|&id| self.is_element(id, b"item"))
            .map(Item)
            .collect())
    }

    /// Returns the first `<item>` under `<channel>`, if any.
    pub fn first_item(&self) -> Result<Option<Item>, DocumentError> {
        let channel = self.channel()?;
        Ok(self
            .children(channel)
            .iter()
            .copied()
            .find(|&id| self.is_element(id, b"item"))
            .map(Item))
    }

    /// Returns the next `<item>` sibling after `item`.
    ///
    /// Returns `None` once `item` has been removed; callers that remove items
    /// while walking must fetch the successor first.
    pub fn next_item(&self, item: Item) -> Option<Item> {
        let parent = self.node(item.0)?.parent?;
        let siblings = self.children(parent);
        let pos = siblings.binary_search(&item.0).ok()?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|&id| self.is_element(id, b"item"))
            .map(Item)
    }

    /// Text content of the item's first child element.
    ///
    /// The title is located by position, not by name. All descendant text and
    /// CDATA is concatenated with entities resolved. An item without any
    /// child element has an empty title.
    pub fn title_of(&self, item: Item) -> Result<String, DocumentError> {
        let node = self.node(item.0).ok_or(DocumentError::Detached)?;
        let mut title = String::new();
        if let Some(&first) = node.children.iter().find(|&&id| self.is_any_element(id)) {
            self.collect_text(first, &mut title);
        }
        Ok(title)
    }

    /// Removes `item` and releases its subtree.
    ///
    /// If the node immediately before the item is whitespace-only text (the
    /// indentation in front of the item), it is removed as well. Any other
    /// preceding sibling is left alone.
    pub fn remove_item(&mut self, item: Item) -> Result<(), DocumentError> {
        let node = self.node(item.0).ok_or(DocumentError::Detached)?;
        let parent = node
            .parent
            .ok_or(DocumentError::Structure("item has no parent element"))?;
        let siblings = self.children(parent);
        let pos = siblings
            .binary_search(&item.0)
            .map_err(|_| DocumentError::Detached)?;
        let strip_preceding = pos
            .checked_sub(1)
            .is_some_and(|prev| self.is_whitespace_text(siblings[prev]));

        let siblings = &mut self
            .nodes
            .get_mut(parent.0)
            .and_then(Option::as_mut)
            .ok_or(DocumentError::Detached)?
            .children;
        let mut detached = vec![siblings.remove(pos)];
        if strip_preceding {
            detached.push(siblings.remove(pos - 1));
        }

        for id in detached {
            self.release(id);
        }
        Ok(())
    }

    /// Renders the tree back to XML.
    ///
    /// Nodes are written as parsed, so retained indentation is reproduced.
    /// An XML declaration is added when the input had none, and the output
    /// always ends with a newline.
    pub fn serialize(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new(Vec::new());

        let has_decl = self.top_level.first().is_some_and(|&id| {
            matches!(
                self.node(id).map(|n| &n.kind),
                Some(NodeKind::Declaration(_))
            )
        });
        if !has_decl {
            write_event(&mut writer, Event::Decl(BytesDecl::new("1.0", None, None)))?;
            write_event(&mut writer, Event::Text(BytesText::from_escaped("\n")))?;
        }

        for &id in &self.top_level {
            self.write_node(&mut writer, id)?;
        }

        let mut output = writer.into_inner();
        if !output.ends_with(b"\n") {
            output.push(b'\n');
        }
        Ok(output)
    }

    fn attach(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            kind,
            parent,
            children: Vec::new(),
        }));
        match parent.and_then(|p| self.nodes.get_mut(p.0).and_then(Option::as_mut)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.top_level.push(id),
        }
        id
    }

    fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(|slot| slot.take()) {
                pending.extend(node.children);
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn element_name(&self, id: NodeId) -> Option<&[u8]> {
        match &self.node(id)?.kind {
            NodeKind::Element { start, .. } => Some(start.name().into_inner()),
            _ => None,
        }
    }

    fn is_element(&self, id: NodeId, name: &[u8]) -> bool {
        self.element_name(id) == Some(name)
    }

    fn is_any_element(&self, id: NodeId) -> bool {
        self.element_name(id).is_some()
    }

    fn is_whitespace_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.kind), Some(NodeKind::Text(t)) if is_whitespace(t))
    }

    fn root(&self) -> Result<NodeId, DocumentError> {
        self.top_level
            .iter()
            .copied()
            .find(|&id| self.is_any_element(id))
            .ok_or(DocumentError::Structure("document has no root element"))
    }

    fn channel(&self) -> Result<NodeId, DocumentError> {
        let root = self.root()?;
        self.children(root)
            .iter()
            .copied()
            .find(|&id| self.is_element(id, b"channel"))
            .ok_or(DocumentError::Structure("no <channel> element under the root"))
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => match text.unescape() {
                Ok(unescaped) => out.push_str(&unescaped),
                Err(e) => {
                    tracing::debug!(error = %e, "Keeping title text with unresolved entity as-is");
                    out.push_str(&String::from_utf8_lossy(text));
                }
            },
            NodeKind::CData(cdata) => out.push_str(&String::from_utf8_lossy(cdata)),
            NodeKind::Element { .. } => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), DocumentError> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        match &node.kind {
            NodeKind::Element {
                start,
                self_closing,
            } => {
                if *self_closing && node.children.is_empty() {
                    write_event(writer, Event::Empty(start.clone()))?;
                } else {
                    write_event(writer, Event::Start(start.clone()))?;
                    for &child in &node.children {
                        self.write_node(writer, child)?;
                    }
                    write_event(writer, Event::End(start.to_end()))?;
                }
            }
            NodeKind::Text(text) => write_event(writer, Event::Text(text.clone()))?,
            NodeKind::CData(cdata) => write_event(writer, Event::CData(cdata.clone()))?,
            NodeKind::Comment(comment) => write_event(writer, Event::Comment(comment.clone()))?,
            NodeKind::ProcessingInstruction(pi) => write_event(writer, Event::PI(pi.clone()))?,
            NodeKind::Declaration(decl) => write_event(writer, Event::Decl(decl.clone()))?,
            NodeKind::DocType(doctype) => write_event(writer, Event::DocType(doctype.clone()))?,
        }
        Ok(())
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::Write(e.to_string()))
}

fn is_whitespace(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}
