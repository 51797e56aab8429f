use crate::types::Command;

/// Sink for encoded commands. Delivery is best-effort: implementations report
/// failures through their own channels and never back to the controller.
pub trait Transmitter {
    fn transmit(&mut self, command: &Command);
}

/// Records every command in order. Handy as a test double and for dry runs.
impl Transmitter for Vec<Command> {
    fn transmit(&mut self, command: &Command) {
        self.push(command.clone());
    }
}

impl<T: Transmitter + ?Sized> Transmitter for &mut T {
    fn transmit(&mut self, command: &Command) {
        (**self).transmit(command);
    }
}

impl<T: Transmitter + ?Sized> Transmitter for Box<T> {
    fn transmit(&mut self, command: &Command) {
        (**self).transmit(command);
    }
}
