/// Page mutation watching, decoupled from the browser observer API

use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord, Node};

/// Receives batches of nodes added to or removed from the page
pub trait PageWatcher {
    type Node;

    fn nodes_added(&self, nodes: &[Self::Node]);

    fn nodes_removed(&self, nodes: &[Self::Node]);
}

/// Forward one batch, skipping empty sides
pub fn dispatch<W: PageWatcher + ?Sized>(watcher: &W, added: &[W::Node], removed: &[W::Node]) {
    if !added.is_empty() {
        watcher.nodes_added(added);
    }
    if !removed.is_empty() {
        watcher.nodes_removed(removed);
    }
}

/// `MutationObserver` over a subtree, feeding a `PageWatcher`.
/// Observation stops when this is dropped.
pub struct MutationWatcher {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl MutationWatcher {
    pub fn observe<W>(target: &Node, watcher: Rc<W>) -> Result<MutationWatcher, JsValue>
    where
        W: PageWatcher<Node = Node> + 'static,
    {
        let callback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
            let mut added = Vec::new();
            let mut removed = Vec::new();

            for record in records.iter() {
                let Ok(record) = record.dyn_into::<MutationRecord>() else {
                    continue;
                };
                collect_nodes(&record.added_nodes(), &mut added);
                collect_nodes(&record.removed_nodes(), &mut removed);
            }

            dispatch(watcher.as_ref(), &added, &removed);
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer.observe_with_options(target, &options)?;

        Ok(MutationWatcher {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

fn collect_nodes(list: &web_sys::NodeList, into: &mut Vec<Node>) {
    for i in 0..list.length() {
        if let Some(node) = list.get(i) {
            into.push(node);
        }
    }
}
