//! The [`Executor`] trait.
use crate::{connection::Connection, transaction::Transaction, transport::Transport};

/// A type that can returns a [`Connection`].
pub trait Executor {
    /// The transport of returned connection.
    type Transport: Transport;

    /// Acquire the connection.
    fn connection(self) -> Connection<Self::Transport>;
}

impl<T: Transport> Executor for &Connection<T> {
    type Transport = T;

    fn connection(self) -> Connection<T> {
        self.clone()
    }
}

impl<T: Transport> Executor for &mut Connection<T> {
    type Transport = T;

    fn connection(self) -> Connection<T> {
        self.clone()
    }
}

impl<T: Transport> Executor for &Transaction<T> {
    type Transport = T;

    fn connection(self) -> Connection<T> {
        Transaction::connection(self).clone()
    }
}

impl<T: Transport> Executor for &mut Transaction<T> {
    type Transport = T;

    fn connection(self) -> Connection<T> {
        Transaction::connection(self).clone()
    }
}
