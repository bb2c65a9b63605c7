//! DOM-effect delegation.
//!
//! Visual effects (highlight overlays, frame-connection traces) are not
//! part of the observation core. The aggregator resolves incoming
//! selectors and element paths to nodes, then hands off to this
//! collaborator.

use async_trait::async_trait;
use tracing::debug;

use hotscope_dom::NodeId;

#[async_trait]
pub trait DomEffects: Send + Sync {
    async fn highlight(&self, nodes: Vec<NodeId>);

    async fn hide_highlighting(&self);

    async fn scroll_and_highlight(&self, node: NodeId);

    async fn show_frame_connections(&self, frame: NodeId, triggers: Vec<NodeId>);

    async fn hide_frame_connections(&self);
}

/// Default collaborator: logs and does nothing.
pub struct NoopEffects;

#[async_trait]
impl DomEffects for NoopEffects {
    async fn highlight(&self, nodes: Vec<NodeId>) {
        debug!(count = nodes.len(), "highlight requested");
    }

    async fn hide_highlighting(&self) {
        debug!("hide highlighting requested");
    }

    async fn scroll_and_highlight(&self, node: NodeId) {
        debug!(?node, "scroll and highlight requested");
    }

    async fn show_frame_connections(&self, frame: NodeId, triggers: Vec<NodeId>) {
        debug!(?frame, triggers = triggers.len(), "show frame connections requested");
    }

    async fn hide_frame_connections(&self) {
        debug!("hide frame connections requested");
    }
}
