use crate::xml::arena::XmlDocument;
use indextree::NodeId;

/// Pre-order descendants of `node` (inclusive) that do not enter subtrees
/// whose root satisfies `prune`. Pruned roots are not yielded either.
pub fn descendants_pruned<'a, F>(
    doc: &'a XmlDocument,
    node: NodeId,
    prune: F,
) -> impl Iterator<Item = NodeId> + 'a
where
    F: Fn(&XmlDocument, NodeId) -> bool + 'a,
{
    PrunedIter {
        doc,
        stack: vec![node],
        prune,
    }
}

struct PrunedIter<'a, F> {
    doc: &'a XmlDocument,
    stack: Vec<NodeId>,
    prune: F,
}

impl<'a, F> Iterator for PrunedIter<'a, F>
where
    F: Fn(&XmlDocument, NodeId) -> bool,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if self.doc.get(current).is_none() || (self.prune)(self.doc, current) {
                continue;
            }
            let children: Vec<_> = self.doc.children(current).collect();
            self.stack.extend(children.into_iter().rev());
            return Some(current);
        }
        None
    }
}
