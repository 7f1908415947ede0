use super::value::{Origin, Origins, Value};
use super::EvaluationErrorKind;
use crate::util::Width;
use std::fmt;

/// Value in one local variable or stack slot, along with the places that could have put it there
///
/// For the stack, producers are the instructions that pushed the slot. For local variables, they
/// are the instructions that stored into the slot (or the method parameters).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Slot<'g> {
    pub value: Value<'g>,
    pub producers: Origins,
}

impl<'g> Slot<'g> {
    pub fn new(value: Value<'g>, producers: Origins) -> Slot<'g> {
        Slot { value, producers }
    }

    /// Slot produced by a single origin
    pub fn produced_by(value: Value<'g>, origin: Origin) -> Slot<'g> {
        Slot::new(value, Origins::from([origin]))
    }

    /// Slot whose content is unusable
    pub fn top() -> Slot<'g> {
        Slot::new(Value::top(), Origins::new())
    }

    fn placeholder(&self) -> Slot<'g> {
        Slot::new(Value::top(), self.producers.clone())
    }

    fn generalize(&self, other: &Slot<'g>, widen: bool) -> Slot<'g> {
        let mut value = self.value.generalize(&other.value);
        if widen && value.kind != self.value.kind {
            value = value.widen();
        }
        Slot {
            value,
            producers: self.producers.union(&other.producers).copied().collect(),
        }
    }
}

impl<'g> fmt::Debug for Slot<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} <- {:?}", self.value.kind, self.producers)
    }
}

/// Local variables of a method
///
/// There is a fixed number of variables. A `long` or `double` in variable `i` leaves an unusable
/// placeholder in variable `i + 1`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Variables<'g> {
    slots: Vec<Slot<'g>>,
}

impl<'g> Variables<'g> {
    pub fn new(size: u16) -> Variables<'g> {
        Variables {
            slots: vec![Slot::top(); size as usize],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn load(&self, index: u16) -> Result<&Slot<'g>, EvaluationErrorKind> {
        self.slots
            .get(index as usize)
            .ok_or(EvaluationErrorKind::LocalOutOfRange(index))
    }

    /// Value of a variable (unusable if the index is out of range)
    pub fn value(&self, index: u16) -> Value<'g> {
        self.load(index)
            .map_or_else(|_| Value::top(), |slot| slot.value.clone())
    }

    pub fn store(&mut self, index: u16, slot: Slot<'g>) -> Result<(), EvaluationErrorKind> {
        let start = index as usize;
        let width = slot.value.width();
        if start + width > self.slots.len() {
            return Err(EvaluationErrorKind::LocalOutOfRange(index));
        }

        // Overwriting the second half of a wide value invalidates it
        if start > 0 && self.slots[start - 1].value.is_category2() {
            self.slots[start - 1] = Slot::top();
        }

        if width == 2 {
            self.slots[start + 1] = slot.placeholder();
        }
        self.slots[start] = slot;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot<'g>> {
        self.slots.iter()
    }

    fn generalize(
        &self,
        other: &Variables<'g>,
        widen: bool,
    ) -> Result<Variables<'g>, EvaluationErrorKind> {
        if self.slots.len() != other.slots.len() {
            return Err(EvaluationErrorKind::LocalOutOfRange(
                self.slots.len().min(other.slots.len()) as u16,
            ));
        }
        let slots = self
            .slots
            .iter()
            .zip(&other.slots)
            .map(|(slot1, slot2)| slot1.generalize(slot2, widen))
            .collect();
        Ok(Variables { slots })
    }
}

/// Operand stack
///
/// A `long` or `double` is pushed on top of an unusable placeholder, so the size of the stack is
/// measured in slots just like the JVM's `max_stack`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Stack<'g> {
    slots: Vec<Slot<'g>>,
}

impl<'g> Stack<'g> {
    pub fn new() -> Stack<'g> {
        Stack { slots: vec![] }
    }

    /// Number of slots on the stack
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Push a value (along with its placeholder, for wide values)
    pub fn push(&mut self, slot: Slot<'g>) {
        if slot.value.is_category2() {
            self.slots.push(slot.placeholder());
        }
        self.slots.push(slot);
    }

    /// Push exactly one slot, without any special handling of wide values
    pub fn push1(&mut self, slot: Slot<'g>) {
        self.slots.push(slot);
    }

    /// Pop a value (along with its placeholder, for wide values)
    pub fn pop(&mut self) -> Result<Slot<'g>, EvaluationErrorKind> {
        let slot = self.pop1()?;
        if slot.value.is_category2() {
            self.pop1()?;
        }
        Ok(slot)
    }

    /// Pop exactly one slot
    pub fn pop1(&mut self) -> Result<Slot<'g>, EvaluationErrorKind> {
        self.slots.pop().ok_or(EvaluationErrorKind::StackUnderflow)
    }

    /// Pop exactly two slots, top first
    pub fn pop2(&mut self) -> Result<(Slot<'g>, Slot<'g>), EvaluationErrorKind> {
        let top = self.pop1()?;
        let below = self.pop1()?;
        Ok((top, below))
    }

    /// Slot at the given depth, where 0 is the top of the stack
    pub fn top(&self, depth: usize) -> Result<&Slot<'g>, EvaluationErrorKind> {
        self.slots
            .len()
            .checked_sub(depth + 1)
            .and_then(|index| self.slots.get(index))
            .ok_or(EvaluationErrorKind::StackUnderflow)
    }

    /// Slot at the given index, where 0 is the bottom of the stack
    pub fn get(&self, index: usize) -> Option<&Slot<'g>> {
        self.slots.get(index)
    }

    /// Iterate from the bottom of the stack to the top
    pub fn iter(&self) -> impl Iterator<Item = &Slot<'g>> {
        self.slots.iter()
    }

    fn generalize(&self, other: &Stack<'g>, widen: bool) -> Result<Stack<'g>, EvaluationErrorKind> {
        if self.slots.len() != other.slots.len() {
            return Err(EvaluationErrorKind::StackHeightMismatch {
                expected: self.slots.len(),
                found: other.slots.len(),
            });
        }
        let slots = self
            .slots
            .iter()
            .zip(&other.slots)
            .map(|(slot1, slot2)| slot1.generalize(slot2, widen))
            .collect();
        Ok(Stack { slots })
    }
}

/// State of the abstract machine at one point in the method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Frame<'g> {
    pub locals: Variables<'g>,
    pub stack: Stack<'g>,
}

impl<'g> Frame<'g> {
    /// Frame with unusable local variables and an empty stack
    pub fn new(max_locals: u16) -> Frame<'g> {
        Frame {
            locals: Variables::new(max_locals),
            stack: Stack::new(),
        }
    }

    /// Frame which is at least as general as both frames
    ///
    /// When widening, slots whose value changes get widened so that repeated merges converge.
    pub fn generalize(&self, other: &Frame<'g>, widen: bool) -> Result<Frame<'g>, EvaluationErrorKind> {
        Ok(Frame {
            locals: self.locals.generalize(&other.locals, widen)?,
            stack: self.stack.generalize(&other.stack, widen)?,
        })
    }
}
