use crate::cache::CarId;

/// Maps car ids to subscription patterns and inbound topics back to
/// `(car, metric)` pairs.
///
/// With namespace `teslamate/cars`, car 1 subscribes to
/// `teslamate/cars/1/#` and `teslamate/cars/1/battery_level` parses to
/// `(1, "battery_level")`.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    namespace: String,
}

impl TopicFilter {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.trim_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Wildcard pattern matching every sub-topic of `car`.
    pub fn subscription(&self, car: CarId) -> String {
        format!("{}/{}/#", self.namespace, car)
    }

    /// Extracts the car id and metric name from an inbound topic.
    ///
    /// Returns `None` for topics outside the namespace, with too few
    /// segments, a non-numeric or out of range car id, or an empty metric.
    /// Segments after the metric are ignored.
    pub fn parse<'a>(&self, topic: &'a str) -> Option<(CarId, &'a str)> {
        let rest = topic
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix('/')?;
        let mut segments = rest.split('/');
        let car = segments.next()?.parse::<CarId>().ok()?;
        let metric = segments.next().filter(|metric| !metric.is_empty())?;
        Some((car, metric))
    }
}
