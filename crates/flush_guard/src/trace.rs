use std::collections::VecDeque;

/// Bounded ring buffer of UI-context action markers.
///
/// Once full, pushing drops the oldest marker.
#[derive(Debug, Clone)]
pub struct MarkerTrace {
	capacity: usize,
	markers: VecDeque<String>,
}

impl MarkerTrace {
	/// Creates an empty trace holding at most `capacity` markers.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			markers: VecDeque::with_capacity(capacity),
		}
	}

	pub fn push(&mut self, marker: String) {
		if self.capacity == 0 {
			return;
		}
		if self.markers.len() >= self.capacity {
			self.markers.pop_front();
		}
		self.markers.push_back(marker);
	}

	pub fn clear(&mut self) {
		self.markers.clear();
	}

	pub fn len(&self) -> usize {
		self.markers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.markers.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Iterates markers oldest first.
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
		self.markers.iter().map(String::as_str)
	}

	/// Renders the trace most recent first, collapsing consecutive repeats.
	pub fn compress(&self) -> String {
		compress_markers(self.iter().rev())
	}
}

/// Joins markers with ` <- `, collapsing runs into `marker xN`.
///
/// Markers are rendered in the order given; callers pass them most recent
/// first.
pub fn compress_markers<'a>(markers: impl IntoIterator<Item = &'a str>) -> String {
	let mut out: Vec<String> = Vec::new();
	let mut run: Option<(&str, usize)> = None;

	for marker in markers {
		match run {
			Some((prev, count)) if prev == marker => run = Some((prev, count + 1)),
			Some((prev, count)) => {
				out.push(render_run(prev, count));
				run = Some((marker, 1));
			}
			None => run = Some((marker, 1)),
		}
	}
	if let Some((prev, count)) = run {
		out.push(render_run(prev, count));
	}
	out.join(" <- ")
}

fn render_run(marker: &str, count: usize) -> String {
	if count == 1 { marker.to_owned() } else { format!("{marker} x{count}") }
}
