//! First-screen ref hydration.
//!
//! During bootstrap the UI context renders before the logic context is
//! ready, using refs with negative ids. Once the logic context delivers the
//! real descriptor, values written to those bootstrap refs are copied into
//! the persistent refs at the same position in the graph. Only bootstrap
//! descriptors flagged as needing hydration are walked.

use worklet_primitives::{CapturedValue, RefHandle};

use crate::error::Result;
use crate::refs::RefSeed;
use crate::runtime::Inner;
use crate::transform::descend;
use crate::value::Value;

impl Inner {
	pub(crate) fn hydrate_first_screen(&self, ctx: &CapturedValue, first_screen_ctx: &CapturedValue) -> Result<()> {
		match first_screen_ctx {
			CapturedValue::Worklet(bootstrap) if bootstrap.needs_hydration => self.hydrate_pair(ctx, first_screen_ctx, 0),
			_ => Ok(()),
		}
	}

	fn hydrate_pair(&self, ctx: &CapturedValue, first_screen: &CapturedValue, depth: usize) -> Result<()> {
		match (ctx, first_screen) {
			(CapturedValue::Ref(handle), CapturedValue::Ref(bootstrap)) => self.hydrate_ref(handle, bootstrap),
			(CapturedValue::Worklet(ctx), CapturedValue::Worklet(first_screen)) => {
				let depth = descend(depth)?;
				for (name, value) in &ctx.captured {
					if let Some(other) = first_screen.captured.get(name) {
						self.hydrate_pair(value, other, depth)?;
					}
				}
				Ok(())
			}
			(CapturedValue::Map(ctx), CapturedValue::Map(first_screen)) => {
				let depth = descend(depth)?;
				for (name, value) in ctx {
					if let Some(other) = first_screen.get(name) {
						self.hydrate_pair(value, other, depth)?;
					}
				}
				Ok(())
			}
			(CapturedValue::List(ctx), CapturedValue::List(first_screen)) => {
				let depth = descend(depth)?;
				for (value, other) in ctx.iter().zip(first_screen) {
					self.hydrate_pair(value, other, depth)?;
				}
				Ok(())
			}
			_ => Ok(()),
		}
	}

	fn hydrate_ref(&self, handle: &RefHandle, bootstrap: &RefHandle) -> Result<()> {
		// Never touched during bootstrap.
		let Some(first_screen) = self.refs.first_screen(bootstrap.id) else {
			return Ok(());
		};

		let seed = RefSeed {
			id: handle.id,
			initial: self.transformer().root(&handle.initial_value)?,
			type_tag: handle.type_tag.clone(),
		};
		let persistent = self.refs.get_or_create(seed)?;
		// Already attached to its element by the tree.
		if matches!(persistent.cell().current(), Value::Element(_)) {
			return Ok(());
		}

		persistent.set(first_screen.cell().current());
		tracing::debug!(id = %handle.id, bootstrap = %bootstrap.id, "first-screen ref hydrated");
		Ok(())
	}
}
