/// Decide and apply in one step, without persistence.
///
/// Used by domain unit tests and anywhere a command must be folded into an
/// in-memory aggregate. Production writes go through the infra dispatcher,
/// which additionally persists and publishes.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: aura_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
