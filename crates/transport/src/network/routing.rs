use super::{Network, NodeId, Pipe, PipeId};
use crate::error::TransportError;
use crate::particle::RoutingPolicy;

/// End of a pipe a particle enters through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    Start,
    End,
}

/// Routing decision at a manhole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outflow {
    pub pipe: PipeId,
    pub entry: PipeEnd,
}

impl Outflow {
    /// 1D position of the entry point along the pipe.
    pub fn entry_position(&self, pipe: &Pipe) -> f64 {
        match self.entry {
            PipeEnd::Start => 0.0,
            PipeEnd::End => pipe.length,
        }
    }
}

impl Network {
    /// Pipes carrying water away from `node` this step, with the discharge
    /// leaving through each. Outgoing pipes count with positive discharge,
    /// incoming pipes with reversed (negative) discharge.
    pub fn outflows(&self, node: NodeId) -> Result<Vec<(Outflow, f64)>, TransportError> {
        let mut result = Vec::new();
        for &id in self.outgoing_pipes(node)? {
            let q = self.pipes[id.0].flow.discharge;
            if q > 0.0 {
                let entry = PipeEnd::Start;
                result.push((Outflow { pipe: id, entry }, q));
            }
        }
        for &id in self.incoming_pipes(node)? {
            let q = self.pipes[id.0].flow.discharge;
            if q < 0.0 {
                let entry = PipeEnd::End;
                result.push((Outflow { pipe: id, entry }, -q));
            }
        }
        Ok(result)
    }

    /// True when no pipe at `node` carries any discharge.
    fn is_dry(&self, node: NodeId) -> Result<bool, TransportError> {
        let outgoing = self.outgoing_pipes(node)?;
        let incoming = self.incoming_pipes(node)?;
        Ok(outgoing
            .iter()
            .chain(incoming)
            .all(|id| self.pipes[id.0].flow.discharge == 0.0))
    }

    /// Pick the pipe a particle leaves `node` through.
    ///
    /// `arrived_through` is the pipe the particle just left and is never
    /// chosen again. `draw` is a uniform sample in `[0, 1)`, only used by
    /// [`RoutingPolicy::Homogeneous`], which picks each outflow with
    /// probability proportional to its discharge. `Heterogeneous` always
    /// takes the largest discharge (lowest pipe id on ties).
    ///
    /// When every pipe at the node is dry the first topological outgoing
    /// pipe is used. `None` means the node is a dead end: nothing flows
    /// away from it, including the case where its pipes only carry water
    /// into it.
    pub fn choose_outflow(
        &self,
        node: NodeId,
        arrived_through: Option<PipeId>,
        policy: RoutingPolicy,
        draw: f64,
    ) -> Result<Option<Outflow>, TransportError> {
        let outflows: Vec<(Outflow, f64)> = self
            .outflows(node)?
            .into_iter()
            .filter(|(o, _)| Some(o.pipe) != arrived_through)
            .collect();
        let total: f64 = outflows.iter().map(|(_, q)| q).sum();
        if outflows.is_empty() || total <= 0.0 {
            if !self.is_dry(node)? {
                return Ok(None);
            }
            return Ok(self
                .outgoing_pipes(node)?
                .iter()
                .find(|&&pipe| Some(pipe) != arrived_through)
                .map(|&pipe| Outflow {
                    pipe,
                    entry: PipeEnd::Start,
                }));
        }

        let chosen = match policy {
            RoutingPolicy::Homogeneous => {
                let target = draw.clamp(0.0, 1.0) * total;
                let mut cumulative = 0.0;
                outflows
                    .iter()
                    .find(|(_, q)| {
                        cumulative += q;
                        target < cumulative
                    })
                    .or(outflows.last())
                    .map(|&(o, _)| o)
            }
            RoutingPolicy::Heterogeneous => outflows
                .iter()
                .fold(None::<(Outflow, f64)>, |best, &(o, q)| match best {
                    Some((b, bq)) if bq > q || (bq == q && b.pipe < o.pipe) => Some((b, bq)),
                    _ => Some((o, q)),
                })
                .map(|(o, _)| o),
        };
        Ok(chosen)
    }
}
